/// What the primary sends on a given loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Scenario,
    FullState,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    Reliable,
    BestEffort,
}

impl PayloadKind {
    /// Scenario payloads are rare and must arrive; state payloads are superseded
    /// by the next one.
    pub fn reliability(self) -> Reliability {
        match self {
            PayloadKind::Scenario => Reliability::Reliable,
            PayloadKind::FullState | PayloadKind::Short => Reliability::BestEffort,
        }
    }
}

/// Loop intervals for the two periodic payloads. An interval of zero disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceConfig {
    pub scenario_interval: u64,
    pub full_state_interval: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            scenario_interval: 100,
            full_state_interval: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CadenceScheduler {
    config: CadenceConfig,
}

impl CadenceScheduler {
    pub fn new(config: CadenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CadenceConfig {
        self.config
    }

    /// Exactly one kind per loop; scenario wins over full state.
    pub fn select(&self, loop_number: u64) -> PayloadKind {
        let due = |interval: u64| loop_number.checked_rem(interval) == Some(0);
        if due(self.config.scenario_interval) {
            PayloadKind::Scenario
        } else if due(self.config.full_state_interval) {
            PayloadKind::FullState
        } else {
            PayloadKind::Short
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadence_over_one_scenario_period() {
        let scheduler = CadenceScheduler::default();
        let kinds: Vec<PayloadKind> = (0..100).map(|n| scheduler.select(n)).collect();
        let count = |kind| kinds.iter().filter(|k| **k == kind).count();

        assert_eq!(count(PayloadKind::Scenario), 1);
        assert_eq!(count(PayloadKind::FullState), 9);
        assert_eq!(count(PayloadKind::Short), 90);
        assert_eq!(kinds[0], PayloadKind::Scenario);
        assert_eq!(kinds[10], PayloadKind::FullState);
        assert_eq!(kinds[11], PayloadKind::Short);
    }

    #[test]
    fn scenario_takes_precedence() {
        let scheduler = CadenceScheduler::default();
        assert_eq!(scheduler.select(200), PayloadKind::Scenario);
        assert_eq!(scheduler.select(210), PayloadKind::FullState);
    }

    #[test]
    fn zero_interval_never_fires() {
        let scheduler = CadenceScheduler::new(CadenceConfig {
            scenario_interval: 0,
            full_state_interval: 0,
        });
        assert!((0..50).all(|n| scheduler.select(n) == PayloadKind::Short));
    }

    #[test]
    fn only_scenario_is_reliable() {
        assert_eq!(PayloadKind::Scenario.reliability(), Reliability::Reliable);
        assert_eq!(PayloadKind::FullState.reliability(), Reliability::BestEffort);
        assert_eq!(PayloadKind::Short.reliability(), Reliability::BestEffort);
    }
}
