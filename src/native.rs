//! Contract for the native 2D-rendering backend.
//!
//! The interpreter never talks to a windowing library directly; it dispatches
//! the `ocl.get_ocl2dra.*` catalogue through this trait. Handles are opaque
//! integers minted by [`RenderGateway::init`].

pub type WindowHandle = i64;

/// Operation names accepted after `ocl.get_ocl2dra.`, checked at parse time.
pub const GATEWAY_OPS: [&str; 23] = [
    "init",
    "set_background",
    "set_title",
    "set_size",
    "set_position",
    "set_fullscreen",
    "set_opacity",
    "set_border",
    "set_min_size",
    "set_max_size",
    "set_always_on_top",
    "set_resizable",
    "set_frame_rate",
    "update",
    "is_running",
    "destroy",
    "hide",
    "show",
    "set_icon",
    "get_mouse_position",
    "get_mouse_button_state",
    "get_delta_time",
    "get_key_state",
];

pub trait RenderGateway {
    /// Creates a window and returns its handle, or `None` when the backend
    /// failed to bring a context up.
    fn init(&mut self, width: i64, height: i64, title: &str) -> Option<WindowHandle>;

    fn set_background(&mut self, handle: WindowHandle, r: i64, g: i64, b: i64);
    fn set_title(&mut self, handle: WindowHandle, title: &str);
    fn set_size(&mut self, handle: WindowHandle, width: i64, height: i64);
    fn set_position(&mut self, handle: WindowHandle, x: i64, y: i64);
    fn set_fullscreen(&mut self, handle: WindowHandle, fullscreen: bool);
    fn set_opacity(&mut self, handle: WindowHandle, opacity: f64);
    fn set_border(&mut self, handle: WindowHandle, bordered: bool);
    fn set_min_size(&mut self, handle: WindowHandle, width: i64, height: i64);
    fn set_max_size(&mut self, handle: WindowHandle, width: i64, height: i64);
    fn set_always_on_top(&mut self, handle: WindowHandle, on_top: bool);
    fn set_resizable(&mut self, handle: WindowHandle, resizable: bool);
    fn set_frame_rate(&mut self, handle: WindowHandle, fps: i64);
    fn set_icon(&mut self, handle: WindowHandle, path: &str);

    /// Pumps the backend event loop and presents the frame.
    fn update(&mut self, handle: WindowHandle);
    fn is_running(&mut self, handle: WindowHandle) -> bool;
    fn destroy(&mut self, handle: WindowHandle);
    fn hide(&mut self, handle: WindowHandle);
    fn show(&mut self, handle: WindowHandle);

    fn mouse_position(&mut self, handle: WindowHandle) -> (i64, i64);
    fn mouse_button_state(&mut self, handle: WindowHandle, button: i64) -> i64;
    fn key_state(&mut self, handle: WindowHandle, key: &str) -> i64;
    fn delta_time(&mut self, handle: WindowHandle) -> f64;
}
