fn main() -> std::process::ExitCode {
    event_checkout_lib::run()
}
