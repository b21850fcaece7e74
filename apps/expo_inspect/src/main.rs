use std::env;
use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use expo_core::{ExposurePolicy, Gateway, MemberDescriptor, Value, ValueCodec};
use expo_log::{LogConfig, init_logging};
use expo_schema::{MemberKind, TypeManifest, TypeRef, TypeRegistry, Validatable};

mod config;
use config::InspectConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get default config path based on executable location
fn default_config_path() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe_path| {
            let stem = exe_path.file_stem()?;
            let parent = exe_path.parent()?;
            Some(parent.join(stem).with_extension("json"))
        })
        .and_then(|path| path.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "./expo_inspect.json".to_string())
}

/// Exposure gateway inspector
#[derive(Parser, Debug)]
#[command(name = "expo_inspect")]
#[command(version = VERSION)]
#[command(about = "Inspect exposed members, parse values and load documents against a type manifest", long_about = None)]
struct Args {
    /// Path to configuration file (JSON)
    #[arg(short, long, global = true, default_value_t = default_config_path())]
    config: String,

    /// Enable logging to file (expo_inspect.log in current directory)
    #[arg(long, global = true, env = "EXPO_LOG_FILE")]
    log_file: bool,

    /// Disable ANSI colors in log output (auto-detected otherwise)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the exposed members of a composite type
    Members {
        /// Type name as declared in the manifest
        type_name: String,
    },
    /// Parse text as a value of the given type
    Parse {
        /// Target type: a primitive, a manifest type, `T[]` or `List<T>`
        type_name: String,
        /// Persisted text
        text: String,
    },
    /// Load a JSON document into a fresh instance
    Load {
        /// Path to the document
        document: String,
    },
    /// Print the JSON Schema of the type manifest
    Schema,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // The schema needs neither config nor manifest
    if let Command::Schema = args.command {
        return match print_schema() {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Failed to generate schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // We can't log errors yet, so we use eprintln! for early failures
    let config = match InspectConfig::from_json_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from '{}': {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };

    let log_config = if args.log_file {
        match std::fs::File::create("expo_inspect.log") {
            Ok(file) => LogConfig::new("expo_inspect::")
                .with_level(config.level())
                .with_log_file(file),
            Err(e) => {
                eprintln!("Unable to create expo_inspect.log: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        LogConfig::<std::fs::File>::new("expo_inspect::").with_level(config.level())
    };

    let log_config = if args.no_color {
        log_config.with_ansi(false)
    } else {
        log_config
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    debug!("expo_inspect v{}", VERSION);
    debug!("Configuration: {}", args.config);
    debug!("  Type Gate: {:?}", config.type_gate);
    debug!("  Enum Encoding: {:?}", config.enum_encoding);

    match run(&args, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, config: &InspectConfig) -> Result<ExitCode, Box<dyn Error>> {
    let manifest_path = config.manifest_path(&args.config);
    let manifest_path = manifest_path.to_string_lossy();
    let types = TypeRegistry::from_json_file(&manifest_path)
        .map_err(|e| format!("Failed to load manifest '{}': {}", manifest_path, e))?;
    info!("Loaded {} types from {}", types.len(), manifest_path);

    let codec = ValueCodec::new();
    let gateway = Gateway::new(&types, &codec)
        .with_policy(ExposurePolicy::new(config.type_gate))
        .with_enum_encoding(config.enum_encoding);

    match &args.command {
        Command::Members { type_name } => {
            for member in gateway.exposed_members(type_name)? {
                println!("{}", describe_member(member));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Parse { type_name, text } => {
            let target: TypeRef = type_name.parse()?;
            match codec.parse_value(&types, &target, text) {
                Some(value) => {
                    println!("{}", value);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("no value");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Load { document } => {
            let content = std::fs::read_to_string(document)
                .map_err(|e| format!("Failed to read document '{}': {}", document, e))?;
            let document: serde_json::Value = serde_json::from_str(&content)?;
            let (object, report) = gateway.instantiate(&document)?;

            println!("{}", Value::Composite(object));
            for issue in &report.issues {
                println!("  ! {}", issue);
            }
            info!(
                "Assigned {} members, {} issues",
                report.assigned,
                report.issues.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Schema => print_schema(),
    }
}

fn print_schema() -> Result<ExitCode, Box<dyn Error>> {
    println!("{}", TypeManifest::schema_json()?);
    Ok(ExitCode::SUCCESS)
}

/// One line per member: name, kind and declared type
fn describe_member(member: &MemberDescriptor) -> String {
    let kind = match member.kind {
        MemberKind::Field { .. } => "field",
        MemberKind::Property { .. } => "property",
    };
    format!("{:<24} {:<8} {}", member.name, kind, member.declared_type)
}
