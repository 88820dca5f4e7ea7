use lid::app::report_error;
use lid::{Error, Lid, LidOptions, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();

    let lid = match build(&args) {
        Ok(lid) => lid,
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(lid_error) => report_error(lid_error),
                None => eprintln!("Error: {:#}", e),
            }
            return ExitCode::FAILURE;
        }
    };

    lid.run_with_args(args).await
}

/// Load the service file and register its services.
///
/// The file is `--config` when given, else `lid.yaml` beside the executable.
/// A missing default file just means no services.
fn build(args: &[OsString]) -> anyhow::Result<Lid> {
    let mut options = LidOptions::for_current_exe()?;
    let exe_dir = options.base_dir.clone();
    let parser = Parser::new();

    let config_path = match explicit_config(args) {
        Some(path) => Some(std::path::absolute(path)?),
        None => Parser::find_config_in_dir(&exe_dir).ok(),
    };

    let Some(config_path) = config_path else {
        return Ok(Lid::with_options(options));
    };
    let config = parser.load_config(&config_path)?;

    // Relative paths in the file resolve against the executable's directory,
    // the same as service working directories.
    if let Some(log_file) = &config.log_file {
        options.log_file = exe_dir.join(log_file);
    }
    if let Some(state_dir) = &config.state_dir {
        options.state_dir = exe_dir.join(state_dir);
        std::fs::create_dir_all(&options.state_dir)?;
    }

    let mut lid = Lid::with_options(options);
    for (name, decl) in &config.services {
        lid.register(name.clone(), decl.to_service_config(name)?)?;
    }
    lid.set_forward_args(vec![OsString::from("--config"), config_path.into_os_string()]);

    Ok(lid)
}

/// The value of `-c`/`--config`, read before clap so the help text can list
/// the services.
fn explicit_config(args: &[OsString]) -> Option<PathBuf> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let arg = arg.to_str()?;
        if arg == "-c" || arg == "--config" {
            return iter.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(value));
        }
        if arg == "--" {
            break;
        }
    }
    None
}
