use std::process::ExitCode;

fn main() -> ExitCode {
    match hplc_quant::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
