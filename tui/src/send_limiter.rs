use std::time::Duration;
use std::time::Instant;

/// Minimum time between two accepted sends.
pub const SEND_COOLDOWN: Duration = Duration::from_millis(1500);

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("send cooldown active for another {remaining:?}")]
pub struct CooldownActive {
    pub remaining: Duration,
}

/// Allows at most one accepted send per cooldown window.
///
/// The window is measured from the previous *accepted* send. A rejected attempt leaves the
/// recorded instant untouched, so hammering Enter never extends the wait.
#[derive(Debug)]
pub struct SendRateLimiter {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl Default for SendRateLimiter {
    fn default() -> Self {
        Self::new(SEND_COOLDOWN)
    }
}

impl SendRateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }

    /// Checks the window without recording anything.
    pub fn check(&self, now: Instant) -> Result<(), CooldownActive> {
        let Some(last) = self.last_accepted else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.cooldown {
            return Err(CooldownActive {
                remaining: self.cooldown - elapsed,
            });
        }
        Ok(())
    }

    /// Records an accepted send at `now` if the window allows it.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), CooldownActive> {
        self.check(now)?;
        self.last_accepted = Some(now);
        Ok(())
    }
}
