use solo_instance::Forwarder;

use crate::cmd::StatusArgs;
use crate::exit::{transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

/// Exit 0 when an instance is listening, 1 when nothing is.
pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.channel.instance_config()?;
    let name = args.channel.channel_name()?;
    let app_id = args.channel.app_id.as_str();

    match Forwarder::new(name).with_config(config).probe() {
        Ok(pid) => {
            print_event(&Event::status(app_id, true, pid), format);
            Ok(SUCCESS)
        }
        Err(err) if err.is_unreachable() => {
            tracing::debug!(error = %err, "no running instance");
            print_event(&Event::status(app_id, false, None), format);
            Ok(FAILURE)
        }
        Err(err) => Err(transport_error("status probe failed", err)),
    }
}
