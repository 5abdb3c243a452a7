use probe_lang::{
    config::SessionConfig,
    diagnostics::{init_tracing, report_config_error, report_runtime_error},
    runtime::{environment::CallArgs, platform::StdPlatform, value::Value, Interpreter},
};
use std::env;
use std::path::Path;
use std::process;
use std::sync::Arc;

const USAGE: &str = "Usage: probe-lang <session.toml> <builtin> [args...] [--name=value ...]";

fn main() {
    init_tracing("warn");
    let args: Vec<String> = env::args().skip(1).collect();

    if args.len() < 2 {
        eprintln!("{USAGE}");
        process::exit(1);
    }

    let config = match SessionConfig::load(Path::new(&args[0])) {
        Ok(config) => config,
        Err(err) => {
            report_config_error(err);
            process::exit(1);
        }
    };
    let authenticated = config.script.authenticated;
    let script = config
        .script
        .name
        .clone()
        .unwrap_or_else(|| args[0].clone());
    let session = match config.into_session(&mut rand::thread_rng()) {
        Ok(session) => session,
        Err(err) => {
            report_config_error(err);
            process::exit(1);
        }
    };

    let builtin = &args[1];
    let mut call_args = CallArgs::new();
    for arg in &args[2..] {
        match arg.strip_prefix("--") {
            Some(named) => {
                let Some((name, value)) = named.split_once('=') else {
                    eprintln!("Named arguments take the form --name=value, got `{arg}`");
                    eprintln!("{USAGE}");
                    process::exit(1);
                };
                call_args.insert(name, argument_value(value));
            }
            None => call_args.push(argument_value(arg)),
        }
    }

    let interpreter = Interpreter::new(Arc::new(StdPlatform))
        .with_authenticated(authenticated)
        .with_script_name(script);
    match interpreter.call_builtin(&session, builtin, call_args) {
        Ok(reply) => println!("{reply}"),
        Err(err) => {
            report_runtime_error(&err);
            process::exit(1);
        }
    }
}

fn argument_value(text: &str) -> Value {
    match text.parse::<i64>() {
        Ok(number) => Value::Int(number),
        Err(_) => Value::from(text),
    }
}
