//! The lock state machine.
//!
//! Consumes foreground observations, taps, lifecycle and policy events and
//! produces show/hide directives for the cover. Pure: no I/O, no clocks.

use crate::gesture::GestureRecognizer;
use crate::pattern::SecretPattern;
use crate::policy::{PolicySnapshot, ProtectedSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use veil_context::AppId;

/// Lock state. Exactly one is active; it alone decides whether the cover shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "app", rename_all = "lowercase")]
pub enum LockState {
    /// No protected app in the foreground.
    #[default]
    Idle,
    /// Cover must be shown for this app.
    Locked(AppId),
    /// Gesture matched; cover suppressed while this app stays in the foreground.
    Unlocked(AppId),
}

impl LockState {
    pub fn app(&self) -> Option<&AppId> {
        match self {
            LockState::Idle => None,
            LockState::Locked(app) | LockState::Unlocked(app) => Some(app),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked(_))
    }
}

/// Instruction for the cover presenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "app", rename_all = "lowercase")]
pub enum Directive {
    Show(AppId),
    Hide,
}

impl Directive {
    pub fn is_show(&self) -> bool {
        matches!(self, Directive::Show(_))
    }
}

/// Last known foreground app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundSnapshot {
    pub app: AppId,
    /// Set when the latest tick could not resolve the foreground app.
    pub stale: bool,
}

/// Central decision engine.
///
/// Session-scoped exemptions: an unlock lasts until the foreground moves to a
/// different app, the screen turns off, or the policy changes.
#[derive(Debug, Clone)]
pub struct LockStateMachine {
    state: LockState,
    snapshot: Option<ForegroundSnapshot>,
    protected: ProtectedSet,
    recognizer: GestureRecognizer,
    self_id: AppId,
    launchers: HashSet<AppId>,
}

impl LockStateMachine {
    pub fn new(
        self_id: AppId,
        launchers: impl IntoIterator<Item = AppId>,
        policy: PolicySnapshot,
    ) -> Self {
        Self {
            state: LockState::Idle,
            snapshot: None,
            protected: policy.protected,
            recognizer: GestureRecognizer::new(policy.pattern),
            self_id,
            launchers: launchers.into_iter().collect(),
        }
    }

    pub fn state(&self) -> &LockState {
        &self.state
    }

    /// True exactly when the state is `Locked`.
    pub fn is_cover_shown(&self) -> bool {
        self.state.is_locked()
    }

    pub fn snapshot(&self) -> Option<&ForegroundSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn protected(&self) -> &ProtectedSet {
        &self.protected
    }

    pub fn pattern(&self) -> &SecretPattern {
        self.recognizer.pattern()
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    /// Directive matching the current state.
    pub fn directive(&self) -> Directive {
        match &self.state {
            LockState::Locked(app) => Directive::Show(app.clone()),
            LockState::Idle | LockState::Unlocked(_) => Directive::Hide,
        }
    }

    /// Self and launchers are never locked, whatever the protected set says.
    pub fn is_excluded(&self, app: &AppId) -> bool {
        *app == self.self_id || self.launchers.contains(app)
    }

    pub fn is_protected(&self, app: &AppId) -> bool {
        !self.is_excluded(app) && self.protected.contains(app)
    }

    /// One foreground observation (poll tick or push event).
    ///
    /// `None` keeps the last snapshot and re-asserts the current directive
    /// without transitioning; with no snapshot at all there is nothing to say.
    pub fn on_foreground_observed(&mut self, app: Option<AppId>) -> Option<Directive> {
        let Some(app) = app else {
            let snapshot = self.snapshot.as_mut()?;
            snapshot.stale = true;
            return Some(self.directive());
        };

        self.snapshot = Some(ForegroundSnapshot {
            app: app.clone(),
            stale: false,
        });
        Some(self.evaluate(&app))
    }

    /// Feed a raw tap code to the recognizer.
    pub fn on_tap(&mut self, code: u8) -> Option<Directive> {
        if self.recognizer.on_tap(code) {
            return self.on_gesture_matched();
        }
        None
    }

    /// Grant the exemption for the locked app. No-op unless `Locked`.
    pub fn on_gesture_matched(&mut self) -> Option<Directive> {
        let LockState::Locked(app) = &self.state else {
            tracing::debug!(state = ?self.state, "gesture matched while not locked, ignoring");
            return None;
        };
        let app = app.clone();

        tracing::info!(app = %app, "unlocked by gesture");
        self.state = LockState::Unlocked(app);
        self.recognizer.reset();
        Some(Directive::Hide)
    }

    /// Screen turned off: drop every exemption and partial attempt.
    ///
    /// The snapshot is discarded too; after screen-on only a fresh observation
    /// can lock again.
    pub fn on_screen_off(&mut self) -> Directive {
        if self.state != LockState::Idle {
            tracing::debug!(state = ?self.state, "screen off, resetting to idle");
        }
        self.state = LockState::Idle;
        self.snapshot = None;
        self.recognizer.reset();
        Directive::Hide
    }

    /// Screen turned on. The state stays `Idle` until the next observation.
    pub fn on_screen_on(&mut self) -> Option<Directive> {
        None
    }

    /// Swap the cached policy and re-evaluate the last known foreground app.
    pub fn on_policy_changed(&mut self, policy: PolicySnapshot) -> Directive {
        tracing::debug!(
            protected = policy.protected.len(),
            pattern_len = policy.pattern.len(),
            "policy changed"
        );
        self.protected = policy.protected;
        self.recognizer.set_pattern(policy.pattern);

        if let LockState::Unlocked(app) = &self.state {
            tracing::debug!(app = %app, "policy change revokes exemption");
            self.state = LockState::Idle;
        }

        match self.snapshot.as_ref().map(|s| s.app.clone()) {
            Some(app) => self.evaluate(&app),
            None => {
                self.state = LockState::Idle;
                Directive::Hide
            }
        }
    }

    fn evaluate(&mut self, app: &AppId) -> Directive {
        if let LockState::Unlocked(unlocked) = &self.state {
            if unlocked == app {
                return Directive::Hide;
            }
            tracing::debug!(from = %unlocked, to = %app, "foreground left exempted app, exemption revoked");
            self.state = LockState::Idle;
        }

        if !self.is_protected(app) {
            if let LockState::Locked(locked) = &self.state {
                tracing::debug!(from = %locked, to = %app, "unprotected app in foreground");
            }
            self.state = LockState::Idle;
            return Directive::Hide;
        }

        if !matches!(&self.state, LockState::Locked(locked) if locked == app) {
            tracing::debug!(app = %app, "protected app in foreground, locking");
            self.state = LockState::Locked(app.clone());
            self.recognizer.reset();
        }
        Directive::Show(app.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_ID: &str = "sh.veil.app";
    const LAUNCHER: &str = "com.launcher.home";

    fn app(id: &str) -> AppId {
        AppId::from(id)
    }

    fn machine(protected: &[&str]) -> LockStateMachine {
        LockStateMachine::new(
            app(SELF_ID),
            [app(LAUNCHER)],
            PolicySnapshot::new(
                protected.iter().copied().collect(),
                SecretPattern::default(),
            ),
        )
    }

    fn observe(m: &mut LockStateMachine, id: &str) -> Option<Directive> {
        m.on_foreground_observed(Some(app(id)))
    }

    fn tap_all(m: &mut LockStateMachine, codes: &[u8]) -> Vec<Option<Directive>> {
        codes.iter().map(|&c| m.on_tap(c)).collect()
    }

    #[test]
    fn test_starts_idle() {
        let m = machine(&["com.bank"]);
        assert_eq!(m.state(), &LockState::Idle);
        assert!(!m.is_cover_shown());
        assert!(m.snapshot().is_none());
    }

    #[test]
    fn test_protected_app_locks() {
        let mut m = machine(&["com.bank"]);
        assert_eq!(observe(&mut m, "com.bank"), Some(Directive::Show(app("com.bank"))));
        assert_eq!(m.state(), &LockState::Locked(app("com.bank")));
        assert!(m.is_cover_shown());
    }

    #[test]
    fn test_unprotected_app_hides() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        assert_eq!(observe(&mut m, "com.news"), Some(Directive::Hide));
        assert_eq!(m.state(), &LockState::Idle);
    }

    #[test]
    fn test_none_without_snapshot_is_silent() {
        let mut m = machine(&["com.bank"]);
        assert_eq!(m.on_foreground_observed(None), None);
        assert_eq!(m.state(), &LockState::Idle);
    }

    #[test]
    fn test_none_retains_snapshot_and_reasserts() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        assert_eq!(
            m.on_foreground_observed(None),
            Some(Directive::Show(app("com.bank")))
        );
        assert_eq!(m.state(), &LockState::Locked(app("com.bank")));
        let snapshot = m.snapshot().unwrap();
        assert_eq!(snapshot.app, app("com.bank"));
        assert!(snapshot.stale);

        observe(&mut m, "com.bank");
        assert!(!m.snapshot().unwrap().stale);
    }

    #[test]
    fn test_self_and_launcher_never_lock() {
        let mut m = machine(&[SELF_ID, LAUNCHER, "com.bank"]);
        assert_eq!(observe(&mut m, SELF_ID), Some(Directive::Hide));
        assert_eq!(m.state(), &LockState::Idle);
        assert_eq!(observe(&mut m, LAUNCHER), Some(Directive::Hide));
        assert_eq!(m.state(), &LockState::Idle);

        observe(&mut m, "com.bank");
        assert_eq!(observe(&mut m, LAUNCHER), Some(Directive::Hide));
        assert!(!m.is_cover_shown());
    }

    #[test]
    fn test_pattern_unlocks_locked_app() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        let results = tap_all(&mut m, &[0, 1, 2, 3]);
        assert_eq!(results, vec![None, None, None, Some(Directive::Hide)]);
        assert_eq!(m.state(), &LockState::Unlocked(app("com.bank")));
        assert!(!m.is_cover_shown());
        assert!(m.recognizer().buffer().is_empty());
    }

    #[test]
    fn test_stray_tap_unlocks_only_after_final_tap() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        let codes = [0, 1, 2, 9, 0, 1, 2, 3];
        for (i, &code) in codes.iter().enumerate() {
            let directive = m.on_tap(code);
            if i + 1 < codes.len() {
                assert_eq!(directive, None, "unlocked early at tap {i}");
                assert!(m.is_cover_shown());
            } else {
                assert_eq!(directive, Some(Directive::Hide));
            }
        }
        assert_eq!(m.state(), &LockState::Unlocked(app("com.bank")));
    }

    #[test]
    fn test_repeated_ticks_keep_partial_gesture() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1]);
        observe(&mut m, "com.bank");
        m.on_foreground_observed(None);
        assert_eq!(m.recognizer().buffer().to_vec(), vec![0, 1]);
        assert_eq!(tap_all(&mut m, &[2, 3]).last(), Some(&Some(Directive::Hide)));
    }

    #[test]
    fn test_fresh_lock_clears_buffer() {
        let mut m = machine(&["com.bank", "com.mail"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2]);
        observe(&mut m, "com.mail");
        assert!(m.recognizer().buffer().is_empty());
        assert_eq!(m.on_tap(3), None);
        assert_eq!(m.state(), &LockState::Locked(app("com.mail")));
    }

    #[test]
    fn test_unlocked_app_stays_unlocked() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);
        for _ in 0..5 {
            assert_eq!(observe(&mut m, "com.bank"), Some(Directive::Hide));
        }
        assert_eq!(m.on_foreground_observed(None), Some(Directive::Hide));
        assert_eq!(m.state(), &LockState::Unlocked(app("com.bank")));
    }

    #[test]
    fn test_switching_away_revokes_exemption() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);

        assert_eq!(observe(&mut m, LAUNCHER), Some(Directive::Hide));
        assert_eq!(m.state(), &LockState::Idle);

        assert_eq!(observe(&mut m, "com.bank"), Some(Directive::Show(app("com.bank"))));
        assert_eq!(m.state(), &LockState::Locked(app("com.bank")));
    }

    #[test]
    fn test_switching_between_protected_apps_relocks() {
        let mut m = machine(&["com.bank", "com.mail"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);
        assert_eq!(observe(&mut m, "com.mail"), Some(Directive::Show(app("com.mail"))));
        assert_eq!(m.state(), &LockState::Locked(app("com.mail")));
    }

    #[test]
    fn test_gesture_matched_is_noop_unless_locked() {
        let mut m = machine(&["com.bank"]);
        assert_eq!(m.on_gesture_matched(), None);
        assert_eq!(m.state(), &LockState::Idle);

        observe(&mut m, "com.news");
        assert_eq!(tap_all(&mut m, &[0, 1, 2, 3]), vec![None, None, None, None]);
        assert_eq!(m.state(), &LockState::Idle);
    }

    #[test]
    fn test_screen_off_always_resets() {
        for setup in [&[][..], &[0u8, 1][..], &[0, 1, 2, 3][..]] {
            let mut m = machine(&["com.bank"]);
            observe(&mut m, "com.bank");
            tap_all(&mut m, setup);
            assert_eq!(m.on_screen_off(), Directive::Hide);
            assert_eq!(m.state(), &LockState::Idle);
            assert!(m.recognizer().buffer().is_empty());
        }
    }

    #[test]
    fn test_screen_off_requires_new_gesture() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);
        m.on_screen_off();
        assert_eq!(m.on_screen_on(), None);
        assert_eq!(m.state(), &LockState::Idle);
        assert_eq!(m.on_foreground_observed(None), None);
        assert_eq!(observe(&mut m, "com.bank"), Some(Directive::Show(app("com.bank"))));
    }

    #[test]
    fn test_policy_removal_hides_locked_app() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        let directive = m.on_policy_changed(PolicySnapshot::default());
        assert_eq!(directive, Directive::Hide);
        assert_eq!(m.state(), &LockState::Idle);
    }

    #[test]
    fn test_policy_removal_clears_unlocked_app() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);
        assert_eq!(m.on_policy_changed(PolicySnapshot::default()), Directive::Hide);
        assert_eq!(m.state(), &LockState::Idle);
    }

    #[test]
    fn test_policy_edit_relocks_exempted_app() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2, 3]);
        let policy = PolicySnapshot::new(
            ["com.bank", "com.mail"].into_iter().collect(),
            SecretPattern::default(),
        );
        assert_eq!(m.on_policy_changed(policy), Directive::Show(app("com.bank")));
        assert_eq!(m.state(), &LockState::Locked(app("com.bank")));
    }

    #[test]
    fn test_policy_addition_locks_current_app_immediately() {
        let mut m = machine(&[]);
        observe(&mut m, "com.chat");
        let policy = PolicySnapshot::new(
            ["com.chat"].into_iter().collect(),
            SecretPattern::default(),
        );
        assert_eq!(m.on_policy_changed(policy), Directive::Show(app("com.chat")));
    }

    #[test]
    fn test_policy_change_swaps_pattern_and_clears_taps() {
        let mut m = machine(&["com.bank"]);
        observe(&mut m, "com.bank");
        tap_all(&mut m, &[0, 1, 2]);
        let pattern = SecretPattern::from_codes([3u8, 3]).unwrap();
        m.on_policy_changed(PolicySnapshot::new(
            ["com.bank"].into_iter().collect(),
            pattern.clone(),
        ));
        assert_eq!(m.pattern(), &pattern);
        assert!(m.recognizer().buffer().is_empty());
        assert_eq!(m.on_tap(3), None);
        assert_eq!(m.on_tap(3), Some(Directive::Hide));
    }

    #[test]
    fn test_policy_change_without_snapshot_hides() {
        let mut m = machine(&["com.bank"]);
        assert_eq!(
            m.on_policy_changed(PolicySnapshot::new(
                ["com.news"].into_iter().collect(),
                SecretPattern::default()
            )),
            Directive::Hide
        );
    }

    #[test]
    fn test_cover_shown_iff_locked_over_mixed_sequence() {
        #[derive(Clone, Copy)]
        enum Step {
            See(&'static str),
            Lost,
            Tap(u8),
            Off,
            On,
            Protect(&'static [&'static str]),
        }
        use Step::*;

        let steps = [
            See("com.bank"), Tap(0), Lost, Tap(1), See("com.news"), See("com.bank"),
            Tap(0), Tap(1), Tap(2), Tap(3), Lost, See("com.bank"), Off, Lost, On,
            See(LAUNCHER), See("com.mail"), Protect(&["com.mail"]), Tap(0), Tap(1),
            Tap(2), Tap(3), Protect(&["com.bank"]), See("com.bank"), Tap(7), See(SELF_ID),
        ];

        let mut m = machine(&["com.bank"]);
        let mut shown = false;
        for step in steps {
            let directive = match step {
                See(id) => observe(&mut m, id),
                Lost => m.on_foreground_observed(None),
                Tap(code) => m.on_tap(code),
                Off => Some(m.on_screen_off()),
                On => m.on_screen_on(),
                Protect(ids) => Some(m.on_policy_changed(PolicySnapshot::new(
                    ids.iter().copied().collect(),
                    SecretPattern::default(),
                ))),
            };
            if let Some(directive) = directive {
                shown = directive.is_show();
            }
            assert_eq!(shown, m.is_cover_shown(), "after {:?}", m.state());
            assert_eq!(shown, m.state().is_locked());
        }
    }
}
