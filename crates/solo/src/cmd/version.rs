use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("solo {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: solo");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("SOLO_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("channel: {}", channel_kind());
    println!(
        "activation: {}",
        solo_instance::platform_activation().name()
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}

fn channel_kind() -> &'static str {
    if cfg!(windows) {
        "named pipe (first instance)"
    } else if cfg!(target_os = "linux") {
        "abstract unix socket"
    } else {
        "unix socket guarded by flock"
    }
}
