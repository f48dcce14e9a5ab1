use std::panic;

/// Pretty backtraces on stderr, plus a copy of the panic in the log file.
///
/// The panic then unwinds as usual: a background thread dies on its own and a
/// panic on the main thread drops the session registry, which ends every
/// live session and removes its files.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        log::error!("Thread '{name}' panicked: {panic_info}");

        default_hook(panic_info);
    }));
}
