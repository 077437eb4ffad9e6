//! Tagged terminal output shared by the command line tools.

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        eprintln!("\x1b[1;34minfo:\x1b[0m {}", format!($($arg)*))
    }
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        eprintln!("\x1b[1;33mwarn:\x1b[0m {}", format!($($arg)*))
    }
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("\x1b[1;31merror:\x1b[0m {}", format!($($arg)*))
    }
}
