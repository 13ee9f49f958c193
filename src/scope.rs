//! Ambient context (spec §3 "Scope") and the process-wide singleton that
//! seeds every new scope's defaults (spec §9 "Global ambient scope").

use ahash::AHashMap;
use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// `user` sub-record on a [`Scope`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub ip: Option<String>,
    pub data: AHashMap<String, String>,
}

/// Caller location, captured by the façade and carried through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallSite {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
}

/// OS/device context, gated by the process-wide capture-options flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceContext {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

/// Bitflags controlling which pieces of [`DeviceContext`] get captured.
/// Default is `NONE`, matching spec §6 ("capture=none").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions(u8);

impl CaptureOptions {
    pub const NONE: CaptureOptions = CaptureOptions(0);
    pub const OS: CaptureOptions = CaptureOptions(1 << 0);
    pub const DEVICE: CaptureOptions = CaptureOptions(1 << 1);
    pub const LOCALE: CaptureOptions = CaptureOptions(1 << 2);
    pub const TIMEZONE: CaptureOptions = CaptureOptions(1 << 3);
    pub const ALL: CaptureOptions = CaptureOptions(0b1111);

    pub fn contains(self, other: CaptureOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: CaptureOptions) -> CaptureOptions {
        CaptureOptions(self.0 | other.0)
    }

    fn from_bits(bits: u8) -> Self {
        CaptureOptions(bits)
    }

    fn bits(self) -> u8 {
        self.0
    }
}

/// The ambient context snapshot attached to every event created from a given
/// logical scope (spec §3).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub user: Option<User>,
    pub process_id: Option<u32>,
    pub thread_id: Option<u64>,
    pub process_name: Option<String>,
    pub call_site: Option<CallSite>,
    pub context: Option<DeviceContext>,
    pub scope_tags: AHashMap<String, String>,
    pub scope_extra: AHashMap<String, crate::event::ExtraValue>,
}

impl Scope {
    /// Builds a scope seeded from the current [`ProcessScope`] snapshot, with
    /// process/thread identity filled in and `context` populated only if the
    /// process-wide capture-options flag allows it.
    pub fn capture(call_site: Option<CallSite>) -> Self {
        let snapshot = process_scope();
        let mut scope_tags = snapshot.tags.as_ref().clone();
        let mut scope_extra = snapshot.extra.as_ref().clone();
        // process-level values are the base; per-call overrides, if any,
        // would be layered on by the caller after `capture()` returns.
        scope_tags.shrink_to_fit();
        scope_extra.shrink_to_fit();
        Scope {
            user: snapshot.user.as_ref().clone(),
            process_id: Some(std::process::id()),
            thread_id: Some(current_thread_id()),
            process_name: snapshot.process_name.as_ref().clone(),
            call_site,
            context: if capture_options().contains(CaptureOptions::DEVICE)
                || capture_options().contains(CaptureOptions::OS)
            {
                Some(snapshot.context.as_ref().clone().unwrap_or_default())
            } else {
                None
            },
            scope_tags,
            scope_extra,
        }
    }
}

fn current_thread_id() -> u64 {
    // std::thread::ThreadId has no stable numeric accessor; hash it instead
    // so call sites get a stable-within-process, comparable identifier.
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// An immutable, shareable snapshot of process-wide ambient state. Writers
/// build a new snapshot and swap it in; readers never observe a torn map
/// (spec §5: "a read during a write never observes a torn mapping").
#[derive(Clone, Default)]
struct ProcessScopeSnapshot {
    tags: Arc<AHashMap<String, String>>,
    extra: Arc<AHashMap<String, crate::event::ExtraValue>>,
    user: Arc<Option<User>>,
    process_name: Arc<Option<String>>,
    context: Arc<Option<DeviceContext>>,
}

static PROCESS_SCOPE: Lazy<ArcSwap<ProcessScopeSnapshot>> =
    Lazy::new(|| ArcSwap::from_pointee(ProcessScopeSnapshot::default()));
static CAPTURE_OPTIONS: AtomicU8 = AtomicU8::new(0);
static DISABLE_PRIVACY_REDACTION: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

fn process_scope() -> Arc<ProcessScopeSnapshot> {
    PROCESS_SCOPE.load_full()
}

/// Read-only handle used by configuration code to mutate the process-wide
/// ambient scope via copy-on-write (lock-free for readers).
pub struct ProcessScope;

impl ProcessScope {
    pub fn set_tag(key: impl Into<String>, value: impl Into<String>) {
        Self::update(|snap| {
            let mut tags = (*snap.tags).clone();
            tags.insert(key.into(), value.into());
            snap.tags = Arc::new(tags);
        });
    }

    pub fn set_extra(key: impl Into<String>, value: crate::event::ExtraValue) {
        Self::update(|snap| {
            let mut extra = (*snap.extra).clone();
            extra.insert(key.into(), value);
            snap.extra = Arc::new(extra);
        });
    }

    pub fn set_user(user: User) {
        Self::update(|snap| {
            snap.user = Arc::new(Some(user));
        });
    }

    pub fn set_process_name(name: impl Into<String>) {
        Self::update(|snap| {
            snap.process_name = Arc::new(Some(name.into()));
        });
    }

    pub fn set_device_context(context: DeviceContext) {
        Self::update(|snap| {
            snap.context = Arc::new(Some(context));
        });
    }

    fn update(f: impl FnOnce(&mut ProcessScopeSnapshot)) {
        let current = PROCESS_SCOPE.load_full();
        let mut next = (*current).clone();
        f(&mut next);
        PROCESS_SCOPE.store(Arc::new(next));
    }

    /// Resets all process-wide ambient state. Test-only: production code has
    /// no legitimate reason to wipe the global scope mid-run.
    #[cfg(test)]
    pub fn reset_for_tests() {
        PROCESS_SCOPE.store(Arc::new(ProcessScopeSnapshot::default()));
        CAPTURE_OPTIONS.store(0, Ordering::Relaxed);
        DISABLE_PRIVACY_REDACTION.store(cfg!(debug_assertions), Ordering::Relaxed);
    }
}

pub fn set_capture_options(options: CaptureOptions) {
    CAPTURE_OPTIONS.store(options.bits(), Ordering::Relaxed);
}

pub fn capture_options() -> CaptureOptions {
    CaptureOptions::from_bits(CAPTURE_OPTIONS.load(Ordering::Relaxed))
}

pub fn set_disable_privacy_redaction(disabled: bool) {
    DISABLE_PRIVACY_REDACTION.store(disabled, Ordering::Relaxed);
}

/// Whether the process-wide `disable_privacy_redaction` flag is set.
/// Defaults to `true` in debug builds, `false` in release (spec §6).
pub fn privacy_redaction_disabled() -> bool {
    DISABLE_PRIVACY_REDACTION.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ExtraValue;

    #[test]
    fn process_scope_writes_are_visible_to_new_captures() {
        ProcessScope::reset_for_tests();
        ProcessScope::set_tag("env", "prod");
        ProcessScope::set_extra("build", ExtraValue::Number(7.0));
        let scope = Scope::capture(None);
        assert_eq!(scope.scope_tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(scope.scope_extra.get("build"), Some(&ExtraValue::Number(7.0)));
        ProcessScope::reset_for_tests();
    }

    #[test]
    fn capture_options_default_to_none() {
        ProcessScope::reset_for_tests();
        assert_eq!(capture_options(), CaptureOptions::NONE);
        let scope = Scope::capture(None);
        assert!(scope.context.is_none());
    }

    #[test]
    fn capture_options_enable_device_context() {
        ProcessScope::reset_for_tests();
        set_capture_options(CaptureOptions::DEVICE);
        ProcessScope::set_device_context(DeviceContext {
            os_name: Some("linux".into()),
            ..Default::default()
        });
        let scope = Scope::capture(None);
        assert!(scope.context.is_some());
        ProcessScope::reset_for_tests();
    }

    #[test]
    fn privacy_redaction_defaults_to_debug_profile() {
        assert_eq!(privacy_redaction_disabled(), cfg!(debug_assertions));
    }
}
