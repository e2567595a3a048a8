// Offline command-line tool for tsnconf.
//
// Encodes query files into the payloads a device expects, decodes captured
// payloads back into configuration, and looks up SIDs. It never talks to a
// device.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::warn;
use serde_json::{Value as Json, json};

use crate::cbor::ContainerMode;
use crate::coap::{Message, PayloadKind, RequestKind, check_response};
use crate::config::{ClientOptions, ConverterOptions, UnknownKeyPolicy};
use crate::converter::Converter;
use crate::error::{Error, FormatError};
use crate::instance_id::InstancePath;
use crate::io::{self as files, LoadedSchema};
use crate::transform::{Detransformed, QueryInput, flatten};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// CORECONF codec for TSN switch configuration.
#[derive(Parser, Debug)]
#[command(
    name = "tsnconf",
    version,
    about = "CORECONF (YANG/SID/CBOR) codec for TSN switch configuration",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode a query file into request payloads (hex, one per line).
    Encode(EncodeArgs),
    /// Decode a hex payload into configuration JSON.
    Decode(DecodeArgs),
    /// Look up a schema node by path or SID.
    Lookup(LookupArgs),
    /// Print a summary of the loaded schema.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// SID file (RFC 9595 JSON). Repeat for every module.
    #[arg(short = 's', long = "sid", required = true, value_hint = ValueHint::FilePath)]
    sid_files: Vec<PathBuf>,

    /// Type and list-key catalog (JSON).
    #[arg(short = 'c', long, value_hint = ValueHint::FilePath)]
    catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnknownKeysArg {
    Abort,
    Text,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Query file (YAML or JSON): paths, `{path: value}` items, or a
    /// configuration tree with `--tree`.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Encode the input as a whole configuration tree (PUT payload).
    #[arg(long)]
    tree: bool,

    /// Order container keys numerically instead of device order.
    #[arg(long)]
    canonical: bool,

    /// Policy for configuration keys without a SID.
    #[arg(long, value_enum, default_value_t = UnknownKeysArg::Abort)]
    unknown_keys: UnknownKeysArg,

    /// Fail read queries that name nodes without a SID instead of
    /// addressing the nearest known ancestor.
    #[arg(long)]
    strict: bool,

    /// Wrap each payload in a CoAP request.
    #[arg(long)]
    frame: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PayloadArg {
    /// Instance sequence (FETCH response, iPATCH body).
    Instances,
    /// SID-keyed datastore container (GET response, PUT body).
    Datastore,
    /// FETCH body: SID addresses.
    Query,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Hex payload; read from stdin when absent or `-`.
    input: Option<String>,

    /// How to interpret a bare payload.
    #[arg(long = "as", value_enum, default_value_t = PayloadArg::Instances)]
    kind: PayloadArg,

    /// Input is a full CoAP message; its Content-Format picks the decoding.
    #[arg(long)]
    frame: bool,

    /// Print `"/a/b/c": value` pairs instead of nested JSON.
    #[arg(long)]
    flatten: bool,
}

#[derive(Args, Debug)]
struct LookupArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Schema path, instance path, or numeric SID.
    target: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Hex text to bytes. Whitespace and a leading `0x` are ignored.
fn parse_hex(text: &str) -> Result<Vec<u8>, FormatError> {
    let text = text.trim();
    let digits: String = text
        .strip_prefix("0x")
        .unwrap_or(text)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(hex::decode(digits)?)
}

/// Exit status for a failed command: 3 when the input names something the
/// schema lacks, 2 when the input cannot be read as a document or payload,
/// 1 otherwise.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Schema(_) => 3,
        Error::Format(_)
        | Error::Type(_)
        | Error::Cbor(_)
        | Error::Message(_)
        | Error::Json(_)
        | Error::Yaml(_) => 2,
        _ => 1,
    }
}

fn fail(err: &Error) -> i32 {
    eprintln!("tsnconf: {err}");
    exit_code(err)
}

fn load(args: &SchemaArgs) -> Result<LoadedSchema, Error> {
    files::load_schema(&args.sid_files, args.catalog.as_deref())
}

fn print_json(value: &Json) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("tsnconf: {e}");
            1
        }
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("tsnconf".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = log_filter(cli.quiet, cli.verbose);
    }
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(args: &EncodeArgs) -> i32 {
    let schema = match load(&args.schema) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let options = ConverterOptions {
        container_mode: if args.canonical {
            ContainerMode::Canonical
        } else {
            ContainerMode::Device
        },
        unknown_keys: match args.unknown_keys {
            UnknownKeysArg::Abort => UnknownKeyPolicy::Abort,
            UnknownKeysArg::Text => UnknownKeyPolicy::Text,
        },
        query_fallback: !args.strict,
    };
    let converter = Converter::new(schema.index, options);

    let payloads: Vec<(RequestKind, String, Result<Vec<u8>, Error>)> = if args.tree {
        match files::read_document(&args.input) {
            Ok(doc) => vec![(
                RequestKind::Replace,
                "datastore".into(),
                converter.encode_datastore(&doc),
            )],
            Err(e) => return fail(&e),
        }
    } else {
        match files::read_query_file(&args.input) {
            Ok(QueryInput::Paths(paths)) => vec![(
                RequestKind::Query,
                format!("{} paths", paths.len()),
                converter.encode_query(&paths),
            )],
            Ok(QueryInput::Patches(items)) => items
                .iter()
                .map(|(p, v)| (RequestKind::Patch, p.to_string(), converter.encode_patch(p, v)))
                .collect(),
            Err(e) => return fail(&e),
        }
    };

    let profile = ClientOptions::default().profile();
    let mut status = 0;
    for (i, (kind, label, payload)) in payloads.into_iter().enumerate() {
        let bytes = match payload {
            Ok(b) => b,
            Err(e) => {
                eprintln!("tsnconf: {label}: {e}");
                status = exit_code(&e);
                continue;
            }
        };
        if !args.frame {
            println!("{}", hex::encode(&bytes));
            continue;
        }
        let mid = u16::try_from(i + 1).unwrap_or(u16::MAX);
        match profile.build(kind, mid, &[], bytes).encode() {
            Ok(framed) => println!("{}", hex::encode(&framed)),
            Err(e) => {
                eprintln!("tsnconf: {label}: {e}");
                status = exit_code(&Error::from(e));
            }
        }
    }
    status
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn read_input(input: Option<&str>) -> Result<String, io::Error> {
    match input {
        Some(text) if text != "-" => Ok(text.to_string()),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn decode_framed(converter: &Converter, bytes: &[u8]) -> Result<Detransformed, Error> {
    let msg = Message::decode(bytes)?;
    let formats = ClientOptions::default().formats;
    if !msg.code.is_request() {
        check_response(&msg, &formats)?;
    }
    match msg.content_format() {
        Some(cf) if cf == formats.query => converter.decode_query(&msg.payload),
        cf => converter.decode_payload(formats.classify(cf), &msg.payload),
    }
}

fn cmd_decode(args: &DecodeArgs) -> i32 {
    let text = match read_input(args.input.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("tsnconf: stdin: {e}");
            return 1;
        }
    };
    let bytes = match parse_hex(&text) {
        Ok(b) => b,
        Err(e) => return fail(&Error::from(e)),
    };
    let schema = match load(&args.schema) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let converter = Converter::new(schema.index, ConverterOptions::default());

    let decoded = if args.frame {
        decode_framed(&converter, &bytes)
    } else {
        match args.kind {
            PayloadArg::Instances => converter.decode_payload(PayloadKind::Instances, &bytes),
            PayloadArg::Datastore => converter.decode_payload(PayloadKind::Datastore, &bytes),
            PayloadArg::Query => converter.decode_query(&bytes),
        }
    };
    let decoded = match decoded {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    for w in &decoded.warnings {
        warn!("{w}");
    }

    if args.flatten {
        print_json(&Json::Object(flatten(&decoded.value)))
    } else {
        print_json(&decoded.value)
    }
}

// ---------------------------------------------------------------------------
// Lookup command
// ---------------------------------------------------------------------------

fn cmd_lookup(args: &LookupArgs) -> i32 {
    let schema = match load(&args.schema) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let index = &schema.index;

    let sid = match args.target.trim().parse::<u64>() {
        Ok(sid) => Some(sid),
        Err(_) => match InstancePath::parse(&args.target) {
            Ok(p) => p.resolve(index).ok().map(|r| r.sid),
            Err(_) => index.sid_of(&args.target),
        },
    };
    let entry = match sid.and_then(|s| index.entry(s)) {
        Some(e) => e,
        None => match sid.map(|s| index.identity_name(s)) {
            Some(Ok(identity)) => {
                return print_json(&json!({"sid": sid, "identity": identity}));
            }
            _ => {
                eprintln!("tsnconf: no schema node matches '{}'", args.target);
                return 3;
            }
        },
    };

    let mut out = json!({
        "sid": entry.sid,
        "path": entry.prefixed_path,
        "name": entry.local_name,
        "parent": entry.parent_sid,
        "delta": entry.delta,
        "children": index.children(entry.sid),
    });
    if let Some(ty) = index.type_of(entry.sid) {
        out["type"] = json!(ty.name());
    }
    if let Some(keys) = index.declared_keys(entry.sid) {
        out["keys"] = json!(keys);
    }
    print_json(&out)
}

// ---------------------------------------------------------------------------
// Schema command
// ---------------------------------------------------------------------------

fn cmd_schema(args: &SchemaArgs) -> i32 {
    match load(args) {
        Ok(schema) => print_json(&json!({
            "files": schema.files,
            "sids": schema.index.len(),
            "catalog-entries": schema.index.catalog().len(),
            "sha256": schema.fingerprint_hex(),
        })),
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    }
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.quiet, cli.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let exit_code = match &cli.command {
        Cmd::Encode(args) => cmd_encode(args),
        Cmd::Decode(args) => cmd_decode(args),
        Cmd::Lookup(args) => cmd_lookup(args),
        Cmd::Schema(args) => cmd_schema(args),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
