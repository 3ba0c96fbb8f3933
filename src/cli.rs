use clap::{Command, arg, crate_version};

pub fn cli() -> Command {
    Command::new("padctl")
        .about("WiFi and Bluetooth settings shell for a touchscreen tablet")
        .version(crate_version!())
        .arg(
            arg!(--"config-dir" <dir>)
                .short('c')
                .required(false)
                .help("Directory holding config.toml and the saved-network store"),
        )
}
