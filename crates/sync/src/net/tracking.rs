use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PendingReliable {
    pub sequence: u32,
    pub peer: SocketAddr,
    pub payload: String,
    pub last_send: Instant,
    pub attempts: u32,
}

/// Outcome of one resend pass.
#[derive(Debug, Default)]
pub struct ResendPlan {
    pub resend: Vec<(u32, SocketAddr, String)>,
    pub abandoned: Vec<(u32, SocketAddr)>,
}

#[derive(Debug)]
pub struct ReliableTracker {
    pending: Vec<PendingReliable>,
    resend_interval: Duration,
    max_attempts: u32,
}

impl ReliableTracker {
    pub fn new(resend_interval: Duration, max_attempts: u32) -> Self {
        Self {
            pending: Vec::new(),
            resend_interval,
            max_attempts,
        }
    }

    pub fn track(&mut self, sequence: u32, peer: SocketAddr, payload: &str) {
        self.pending.push(PendingReliable {
            sequence,
            peer,
            payload: payload.to_owned(),
            last_send: Instant::now(),
            attempts: 1,
        });
    }

    pub fn acknowledge(&mut self, sequence: u32, peer: SocketAddr) -> bool {
        let before = self.pending.len();
        self.pending
            .retain(|p| !(p.sequence == sequence && p.peer == peer));
        self.pending.len() != before
    }

    pub fn due(&mut self, now: Instant) -> ResendPlan {
        let mut plan = ResendPlan::default();
        let max_attempts = self.max_attempts;
        let interval = self.resend_interval;

        self.pending.retain_mut(|p| {
            if now.duration_since(p.last_send) < interval {
                return true;
            }
            if p.attempts >= max_attempts {
                plan.abandoned.push((p.sequence, p.peer));
                return false;
            }
            p.attempts += 1;
            p.last_send = now;
            plan.resend.push((p.sequence, p.peer, p.payload.clone()));
            true
        });

        plan
    }

    /// Drops everything still queued for `peer`.
    pub fn forget_peer(&mut self, peer: SocketAddr) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.peer != peer);
        before - self.pending.len()
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug)]
pub struct ReceiveTracker {
    recent_sequences: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            recent_sequences: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Returns false if `sequence` was already seen within the window.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if self.recent_sequences.contains(&sequence) {
            return false;
        }

        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        true
    }

    pub fn reset(&mut self) {
        self.recent_sequences.clear();
    }
}
