//! A document viewer that keeps one window per user session.
//!
//! Run it twice: the second launch hands its file arguments to the first and
//! exits immediately.
//!
//! ```text
//! cargo run -p solo --example viewer -- notes.txt
//! cargo run -p solo --example viewer -- todo.txt
//! ```

use std::sync::mpsc;
use std::time::Duration;

use solo::{Role, SingleInstance};

fn main() -> Result<(), solo::instance::InstanceError> {
    let (tx, rx) = mpsc::channel::<Vec<String>>();
    let instance = SingleInstance::builder("com.example.viewer")
        .on_new_instance(move |files| {
            let _ = tx.send(files);
        })
        .log(|msg| eprintln!("[solo] {msg}"))
        .build();

    if instance.start_with_env_args()? == Role::Secondary {
        println!("handed off to the running viewer");
        return Ok(());
    }

    println!("viewer running; launch again to open more files (exits after 60s idle)");
    while let Ok(files) = rx.recv_timeout(Duration::from_secs(60)) {
        println!("open requested: {files:?}");
    }

    Ok(())
}
