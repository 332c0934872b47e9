#[macro_export]
macro_rules! expect {
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(t) => t,
            Err(why) => {
                panic!("{}: {:?}", $msg, why);
            }
        }
    };
}

// Thin wrappers so call sites don't need a use for every level and the
// crate can swap the backing facade in one place.

#[macro_export]
macro_rules! sono_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[macro_export]
macro_rules! sono_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! sono_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! sono_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! sono_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}
