use std::process::ExitCode;

fn main() -> ExitCode {
    match devbox_installer::run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("❌ {:#}", err);
            ExitCode::from(devbox_installer::exit_code_for(&err))
        }
    }
}
