// Module: Driver
// Capability contract of the device backend executing low-level UI actions.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::command::{KeyCode, OutgoingRequestRule, Platform, Point, SwipeDirection};
use crate::hierarchy::{TreeNode, UiElement, ViewHierarchy};

/// Static device facts, fetched once per flow run and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: Platform,
    /// Interaction coordinate space (taps, swipes, element bounds).
    pub width_grid: i64,
    pub height_grid: i64,
    /// Physical display points.
    pub width_points: i64,
    pub height_points: i64,
}

/// The polymorphic backend the orchestra drives.
///
/// Every method is a synchronous device round-trip from the flow's point of
/// view; errors propagate to the flow driver unchanged unless a command
/// reclassifies them (launch/state preparation, outgoing-request asserts).
/// Timed element lookup is orchestra logic: the driver only snapshots the
/// current view hierarchy.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn device_info(&self) -> Result<DeviceInfo>;

    /// Snapshot of the current screen's accessibility tree.
    async fn view_hierarchy(&self) -> Result<TreeNode>;

    #[allow(clippy::too_many_arguments)]
    async fn tap_element(
        &self,
        element: &UiElement,
        hierarchy: &ViewHierarchy,
        retry_if_no_change: bool,
        wait_until_visible: bool,
        long_press: bool,
        app_id: Option<&str>,
    ) -> Result<()>;

    async fn tap_point(
        &self,
        x: i64,
        y: i64,
        retry_if_no_change: bool,
        long_press: bool,
    ) -> Result<()>;

    /// Tap at a position given as screen percentages (0..=100).
    async fn tap_relative(
        &self,
        percent_x: u8,
        percent_y: u8,
        retry_if_no_change: bool,
        long_press: bool,
    ) -> Result<()>;

    async fn swipe_direction(&self, direction: SwipeDirection, duration_ms: u64) -> Result<()>;

    async fn swipe_element(
        &self,
        element: &UiElement,
        direction: SwipeDirection,
        duration_ms: u64,
    ) -> Result<()>;

    /// Swipe between two positions given as screen percentages.
    async fn swipe_relative(
        &self,
        start: (u8, u8),
        end: (u8, u8),
        duration_ms: u64,
    ) -> Result<()>;

    async fn swipe_points(&self, start: Point, end: Point, duration_ms: u64) -> Result<()>;

    async fn swipe_from_center(
        &self,
        direction: SwipeDirection,
        duration_ms: u64,
    ) -> Result<()>;

    async fn back_press(&self) -> Result<()>;

    async fn hide_keyboard(&self) -> Result<()>;

    async fn scroll_vertical(&self) -> Result<()>;

    async fn press_key(&self, code: KeyCode) -> Result<()>;

    async fn wait_for_animation_to_end(&self, timeout_ms: Option<u64>) -> Result<()>;

    async fn wait_for_app_to_settle(&self) -> Result<()>;

    async fn input_text(&self, text: &str) -> Result<()>;

    fn is_unicode_input_supported(&self) -> bool;

    async fn erase_text(&self, characters: usize) -> Result<()>;

    async fn launch_app(
        &self,
        app_id: &str,
        launch_arguments: &HashMap<String, serde_json::Value>,
        stop_if_running: bool,
    ) -> Result<()>;

    async fn stop_app(&self, app_id: &str) -> Result<()>;

    async fn open_link(
        &self,
        link: &str,
        app_id: Option<&str>,
        auto_verify: bool,
        browser: bool,
    ) -> Result<()>;

    async fn clear_app_state(&self, app_id: &str) -> Result<()>;

    async fn push_app_state(&self, app_id: &str, file: &Path) -> Result<()>;

    async fn pull_app_state(&self, app_id: &str, file: &Path) -> Result<()>;

    async fn set_permissions(
        &self,
        app_id: &str,
        permissions: &HashMap<String, String>,
    ) -> Result<()>;

    async fn clear_keychain(&self) -> Result<()>;

    async fn take_screenshot(&self, file: &Path) -> Result<()>;

    async fn set_location(&self, latitude: f64, longitude: f64) -> Result<()>;

    /// Routes the device's traffic through a local proxy port.
    async fn set_proxy(&self, port: u16) -> Result<()>;

    /// Asserts over the requests recorded by the device-side interceptor.
    /// A non-matching rule is an `Err`.
    async fn assert_outgoing_request(&self, rule: &OutgoingRequestRule) -> Result<()>;
}
