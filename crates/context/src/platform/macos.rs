//! macOS-specific implementation of the usage log.
//!
//! macOS keeps no queryable usage-event history, so the frontmost application
//! reported by NSWorkspace is surfaced as a single fresh foreground event.

use crate::error::{ContextError, Result};
use crate::provider::{LauncherQuery, PermissionProbe, UsageLog};
use crate::state::{AppId, PermissionReport, UsageEvent, UsageEventKind, UsageStat};

// Native Cocoa imports for efficient frontmost app detection
use objc::runtime::{Class, Object};
use objc::{msg_send, sel, sel_impl};

/// Desktop shell processes that play the launcher role on macOS.
const LAUNCHER_BUNDLE_IDS: &[&str] = &[
    "com.apple.dock",
    "com.apple.finder",
    "com.apple.loginwindow",
    "com.apple.Spotlight",
];

/// macOS implementation using NSWorkspace.frontmostApplication.
#[derive(Debug, Default)]
pub struct MacOSProvider;

impl MacOSProvider {
    pub fn new() -> Self {
        Self
    }
}

impl UsageLog for MacOSProvider {
    fn query_events(&self, _begin_ms: i64, end_ms: i64) -> Result<Vec<UsageEvent>> {
        let bundle_id = get_frontmost_bundle_id().ok_or_else(|| {
            ContextError::QueryFailed("NSWorkspace returned no frontmost application".into())
        })?;
        Ok(vec![UsageEvent::new(
            bundle_id,
            UsageEventKind::MoveToForeground,
            end_ms,
        )])
    }

    fn query_usage_stats(&self, _begin_ms: i64, _end_ms: i64) -> Result<Vec<UsageStat>> {
        Ok(Vec::new())
    }
}

impl PermissionProbe for MacOSProvider {
    fn check(&self) -> PermissionReport {
        // Frontmost-app queries and borderless windows need no TCC grant.
        PermissionReport::all_granted()
    }
}

impl LauncherQuery for MacOSProvider {
    fn launcher_ids(&self) -> Vec<AppId> {
        LAUNCHER_BUNDLE_IDS.iter().map(|&id| AppId::from(id)).collect()
    }
}

/// Get the bundle ID of the frontmost application using native Cocoa APIs.
fn get_frontmost_bundle_id() -> Option<String> {
    unsafe {
        let workspace_class = Class::get("NSWorkspace")?;

        // [NSWorkspace sharedWorkspace]
        let shared_workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
        if shared_workspace.is_null() {
            return None;
        }

        // [workspace frontmostApplication]
        let frontmost_app: *mut Object = msg_send![shared_workspace, frontmostApplication];
        if frontmost_app.is_null() {
            return None;
        }

        // [app bundleIdentifier]
        let bundle_id_ns: *mut Object = msg_send![frontmost_app, bundleIdentifier];
        let bundle_id = nsstring_to_string(bundle_id_ns)?;

        if bundle_id.is_empty() {
            return None;
        }

        Some(bundle_id)
    }
}

/// Convert NSString to Rust String.
unsafe fn nsstring_to_string(nsstring: *mut Object) -> Option<String> {
    if nsstring.is_null() {
        return None;
    }

    // [nsstring UTF8String]
    let c_str: *const std::os::raw::c_char = msg_send![nsstring, UTF8String];
    if c_str.is_null() {
        return None;
    }

    let rust_str = std::ffi::CStr::from_ptr(c_str).to_str().ok()?;
    Some(rust_str.to_string())
}
