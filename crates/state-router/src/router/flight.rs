// File: src/router/flight.rs
// Purpose: One-activation-at-a-time guard with a single pending slot

use tokio::sync::oneshot;

use super::Navigation;
use crate::Params;

/// How a navigation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Via {
    /// `go`: missing params are filled from the active ones and the
    /// canonical url is written back to a linked location
    Go,
    /// `set_url`: params come straight from the matched url
    Url,
}

/// A state to activate, with its params
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub name: String,
    pub params: Params,
    pub via: Via,
}

impl Target {
    pub fn go(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
            via: Via::Go,
        }
    }

    pub fn url(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
            via: Via::Url,
        }
    }
}

/// What to do once the in-flight activation has settled
pub(crate) enum Settle {
    /// Nothing pending: the router is idle again, report to these waiters
    Done(Vec<oneshot::Sender<Navigation>>),
    /// A navigation arrived meanwhile: activate it next
    Next(Target),
}

#[derive(Default)]
pub(crate) struct Flight {
    activating: bool,
    pending: Option<Target>,
    redirected: bool,
    waiters: Vec<oneshot::Sender<Navigation>>,
}

impl Flight {
    /// Claims the router for `target`, or defers it behind the activation
    /// already in flight. A deferred target replaces any earlier pending one.
    pub fn claim(&mut self, target: Target) -> Result<Target, oneshot::Receiver<Navigation>> {
        if !self.activating {
            self.activating = true;
            return Ok(target);
        }

        let (tx, rx) = oneshot::channel();
        self.pending = Some(target);
        self.redirected = false;
        self.waiters.push(tx);
        Err(rx)
    }

    /// Records a navigation requested by the running activation itself
    ///
    /// Nobody waits on it: it supersedes the activation as a redirect.
    pub fn redirect(&mut self, target: Target) {
        self.pending = Some(target);
        self.redirected = true;
    }

    /// The pending target, and whether it came from the running activation
    pub fn take_pending(&mut self) -> Option<(Target, bool)> {
        let redirected = std::mem::take(&mut self.redirected);
        self.pending.take().map(|target| (target, redirected))
    }

    pub fn settle(&mut self) -> Settle {
        match self.pending.take() {
            Some(next) => {
                self.redirected = false;
                Settle::Next(next)
            }
            None => {
                self.activating = false;
                Settle::Done(std::mem::take(&mut self.waiters))
            }
        }
    }

    /// Resets after the driving future was dropped mid-activation,
    /// handing back the waiters still owed an outcome
    pub fn abort(&mut self) -> Vec<oneshot::Sender<Navigation>> {
        self.activating = false;
        self.pending = None;
        self.redirected = false;
        std::mem::take(&mut self.waiters)
    }

    pub fn is_activating(&self) -> bool {
        self.activating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_claim_when_idle() {
        let mut flight = Flight::default();
        let target = flight.claim(Target::go("a", params! {})).ok().unwrap();
        assert_eq!(target.name, "a");
        assert!(flight.is_activating());
    }

    #[test]
    fn test_last_deferred_target_wins() {
        let mut flight = Flight::default();
        let _ = flight.claim(Target::go("a", params! {}));
        assert!(flight.claim(Target::go("a.b", params! { "id" => 1 })).is_err());
        assert!(flight.claim(Target::url("a.b", params! { "id" => 2 })).is_err());

        match flight.settle() {
            Settle::Next(next) => {
                assert_eq!(next.params, params! { "id" => 2 });
                assert_eq!(next.via, Via::Url);
            }
            Settle::Done(_) => panic!("expected a pending target"),
        }

        match flight.settle() {
            Settle::Done(waiters) => assert_eq!(waiters.len(), 2),
            Settle::Next(_) => panic!("nothing should be pending"),
        }
        assert!(!flight.is_activating());
    }

    #[test]
    fn test_abort_returns_waiters() {
        let mut flight = Flight::default();
        let _ = flight.claim(Target::go("a", params! {}));
        let mut rx = flight.claim(Target::go("b", params! {})).err().unwrap();

        let waiters = flight.abort();
        assert!(!flight.is_activating());
        assert!(flight.take_pending().is_none());
        assert_eq!(waiters.len(), 1);

        for waiter in waiters {
            let _ = waiter.send(Err(crate::RouterError::Aborted));
        }
        assert!(matches!(rx.try_recv(), Ok(Err(crate::RouterError::Aborted))));
    }

    #[test]
    fn test_redirect_is_flagged_until_overridden() {
        let mut flight = Flight::default();
        let _ = flight.claim(Target::go("a", params! {}));

        flight.redirect(Target::go("login", params! {}));
        let (target, redirected) = flight.take_pending().unwrap();
        assert_eq!(target.name, "login");
        assert!(redirected);

        flight.redirect(Target::go("login", params! {}));
        let _rx = flight.claim(Target::go("home", params! {})).err().unwrap();
        let (target, redirected) = flight.take_pending().unwrap();
        assert_eq!(target.name, "home");
        assert!(!redirected);
    }
}
