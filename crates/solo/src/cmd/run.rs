use std::sync::mpsc::{self, Sender};

use solo_instance::{Role, SingleInstance};

use crate::cmd::RunArgs;
use crate::exit::{instance_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, Event, OutputFormat};

enum RunEvent {
    Forwarded(Vec<String>),
    Interrupted,
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.channel.instance_config()?;
    let app_id = args.channel.app_id.as_str();

    let (tx, rx) = mpsc::channel();
    let forwarded_tx = tx.clone();
    let instance = SingleInstance::builder(app_id)
        .config(config)
        .on_new_instance(move |argv| {
            let _ = forwarded_tx.send(RunEvent::Forwarded(argv));
        })
        .build();

    let role = instance
        .start(args.args)
        .map_err(|err| instance_error("start failed", err))?;
    print_event(&Event::started(app_id, role), format);

    if role == Role::Secondary {
        return Ok(SUCCESS);
    }

    install_ctrlc_handler(tx)?;

    let mut printed = 0usize;
    while let Ok(event) = rx.recv() {
        match event {
            RunEvent::Forwarded(argv) => {
                print_event(&Event::forwarded(app_id, &argv), format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            RunEvent::Interrupted => break,
        }
    }

    instance.dispose();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(tx: Sender<RunEvent>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(RunEvent::Interrupted);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
