/// User notification interface (ground station text messages)

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

pub trait Notifier {
    /// Send a short human readable message to the user
    fn send_text(&mut self, severity: Severity, text: &str);
}
