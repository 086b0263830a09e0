/// Consumer-provided navigation side effects.
///
/// The session manager redirects after logout, route guards redirect on
/// failed refresh, and the HTTP pipeline raises a page-level error on 404.
pub trait Navigator: Send + Sync + 'static {
    /// Navigate to `route`.
    fn navigate(&self, route: &str);

    /// Replace the current page with an error page.
    fn show_error_page(&self, status: u16, message: &str);
}

/// Navigator for headless use: records intent in the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(route = %route, "Navigation requested");
    }

    fn show_error_page(&self, status: u16, message: &str) {
        tracing::warn!(status, message = %message, "Error page requested");
    }
}
