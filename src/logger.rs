use std::fs::{create_dir_all, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Log event types that determine which receivers should log the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// Per-consumer step data (private draws, decisions, submitted reviews)
    Step,
    /// Per-series data (generated series summaries, policy draws)
    Simulation,
    /// Variant-level data (final results of one configured variant)
    Variant,
    /// Scenario-level data (comparisons between variants, scenario summaries)
    Scenario,
    /// Validation results (pass/fail messages, validation checks)
    Validation,
}

impl LogEvent {
    /// Position in the verbosity hierarchy Step < Simulation < Variant <
    /// Scenario < Validation. Error and warning messages propagate upward.
    fn rank(self) -> usize {
        match self {
            LogEvent::Step => 0,
            LogEvent::Simulation => 1,
            LogEvent::Variant => 2,
            LogEvent::Scenario => 3,
            LogEvent::Validation => 4,
        }
    }
}

/// Trait for log receivers that can receive log messages
pub trait LogReceiver {
    /// Check if this receiver should handle the given log event
    fn should_log(&self, event: LogEvent) -> bool;

    /// Write a string to this receiver
    fn write(&mut self, s: &str) -> io::Result<()>;

    /// Flush this receiver
    fn flush(&mut self) -> io::Result<()>;
}

/// Console log receiver (writes to stdout)
pub struct ConsoleReceiver {
    enabled_events: Vec<LogEvent>,
}

impl ConsoleReceiver {
    /// Create a new console receiver, boxed and ready to be added to a logger
    pub fn new(enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(Self { enabled_events })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        print!("{}", s);
        io::stdout().flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// File log receiver. The file is created (truncated if it exists) along
/// with any missing parent directories; creation failures panic.
pub struct FileReceiver {
    file: File,
    enabled_events: Vec<LogEvent>,
}

impl FileReceiver {
    pub fn new(path: &Path, enabled_events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).expect("Failed to create log directory");
        }
        let file = File::create(path).expect("Failed to create log file");
        Box::new(Self {
            file,
            enabled_events,
        })
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.enabled_events.contains(&event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        write!(self.file, "{}", s)?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Unique identifier for a receiver
pub type ReceiverId = usize;

static RECEIVER_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Main logger that routes messages to the registered receivers by event
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    /// Create a new logger with no receivers
    pub fn new() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Add a receiver to the logger and return its unique ID
    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = RECEIVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    /// Remove a receiver by its ID
    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(receiver_id, _)| *receiver_id != id);
    }

    /// Write a message with a specific log event type
    pub fn log(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            if receiver.should_log(event) {
                receiver.write(message)?;
            }
        }
        Ok(())
    }

    /// Write a message with newline
    pub fn logln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log(event, &format!("{}\n", message))
    }

    /// Write a prefixed message to the given event and every event above it
    /// in the hierarchy; each receiver gets the message at most once
    fn log_with_prefix(&mut self, event: LogEvent, prefix: &str, message: &str) -> io::Result<()> {
        let formatted_message = format!("{} {}\n", prefix, message);
        let events = [
            LogEvent::Step,
            LogEvent::Simulation,
            LogEvent::Variant,
            LogEvent::Scenario,
            LogEvent::Validation,
        ];
        for (_, receiver) in &mut self.receivers {
            let should_receive = events
                .iter()
                .filter(|candidate| candidate.rank() >= event.rank())
                .any(|&candidate| receiver.should_log(candidate));
            if should_receive {
                receiver.write(&formatted_message)?;
            }
        }
        Ok(())
    }

    /// Write "ERROR ..." to the given event and all upward events
    pub fn errln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "ERROR", message)
    }

    /// Write "WARNING ..." to the given event and all upward events
    pub fn warnln(&mut self, event: LogEvent, message: &str) -> io::Result<()> {
        self.log_with_prefix(event, "WARNING", message)
    }

    /// Flush all receivers
    pub fn flush(&mut self) -> io::Result<()> {
        for (_, receiver) in &mut self.receivers {
            receiver.flush()?;
        }
        Ok(())
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitize a string to be used as a filename
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Macro to log a formatted string (like println! but for logger)
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.logln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log a formatted string without newline (like print! but for logger)
#[macro_export]
macro_rules! log {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.log($event, &format!($($arg)*));
        }
    };
}

/// Macro to log "ERROR ..." to the given event and all upward events
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.errln($event, &format!($($arg)*));
        }
    };
}

/// Macro to log "WARNING ..." to the given event and all upward events
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {
        {
            let _ = $logger.warnln($event, &format!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test name"), "test_name");
        assert_eq!(sanitize_filename("test/name"), "test_name");
        assert_eq!(sanitize_filename("test:name"), "test_name");
    }

    struct CaptureReceiver {
        enabled_events: Vec<LogEvent>,
        captured: Rc<RefCell<String>>,
    }

    impl LogReceiver for CaptureReceiver {
        fn should_log(&self, event: LogEvent) -> bool {
            self.enabled_events.contains(&event)
        }
        fn write(&mut self, s: &str) -> io::Result<()> {
            self.captured.borrow_mut().push_str(s);
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_route_to_matching_receivers_only() {
        let captured = Rc::new(RefCell::new(String::new()));
        let mut logger = Logger::new();
        logger.add_receiver(Box::new(CaptureReceiver {
            enabled_events: vec![LogEvent::Validation],
            captured: Rc::clone(&captured),
        }));

        logger.logln(LogEvent::Step, "ignored").unwrap();
        logger.logln(LogEvent::Validation, "kept").unwrap();
        assert_eq!(*captured.borrow(), "kept\n");
    }

    #[test]
    fn test_errors_propagate_upward_once() {
        let captured = Rc::new(RefCell::new(String::new()));
        let mut logger = Logger::new();
        // listens to two upward events; the error must arrive exactly once
        logger.add_receiver(Box::new(CaptureReceiver {
            enabled_events: vec![LogEvent::Scenario, LogEvent::Validation],
            captured: Rc::clone(&captured),
        }));

        logger.errln(LogEvent::Simulation, "boom").unwrap();
        assert_eq!(*captured.borrow(), "ERROR boom\n");
    }
}
