use solo_instance::Forwarder;

use crate::cmd::SendArgs;
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.channel.instance_config()?;
    let name = args.channel.channel_name()?;

    let outcome = Forwarder::new(name).with_config(config).forward(args.args.as_slice());
    if !outcome.delivered {
        return Err(CliError::new(
            FAILURE,
            format!("no running instance of {} accepted the arguments", args.channel.app_id),
        ));
    }

    print_event(&Event::sent(&args.channel.app_id, outcome.server_pid, &args.args), format);
    Ok(SUCCESS)
}
