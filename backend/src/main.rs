//! HCE CLI - clean and aggregate HR compensation spreadsheets
//!
//! # Commands
//!
//! ```bash
//! hce serve                                        # Start HTTP server (port 3000)
//! hce columns POSDATA.xlsx                         # List columns and row count
//! hce clean --posdata POSDATA.xlsx --pname PNAME.xlsx      # → POSDATA_NEW.xlsx
//! hce rdpac --posdata POSDATA.xlsx --pname PNAME.xlsx      # → Grouped_Data.xlsx
//! hce groupby POSDATA.xlsx --by SMI_CODE --by Function     # → Customise_groupby.xlsx
//! hce groupby POSDATA.xlsx --by SMI_CODE --metric CMP1 --method mean --exclude-flag EXCL_PML
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use hce::models::columns::{PNAME, POSDATA};
use hce::transform::pipeline::{clean_to_xlsx, custom_to_xlsx, rdpac_to_xlsx, Download};
use hce::{load_file, CustomRequest, Method, Settings};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hce")]
#[command(
    about = "Clean, merge and aggregate POSDATA / PNAME compensation spreadsheets",
    long_about = None
)]
struct Cli {
    /// Year tenure is measured against (default: current year)
    #[arg(long, global = true, env = "HCE_CURRENT_YEAR")]
    year: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the columns and row count of a spreadsheet
    Columns {
        /// Input file (xlsx, xls, ods, csv)
        input: PathBuf,
    },

    /// Clean POSDATA and merge it with PNAME
    Clean {
        #[arg(long)]
        posdata: PathBuf,

        #[arg(long)]
        pname: PathBuf,

        /// Output file (default: POSDATA_NEW.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the eleven-sheet RDPAC report
    Rdpac {
        #[arg(long)]
        posdata: PathBuf,

        #[arg(long)]
        pname: PathBuf,

        /// Output file (default: Grouped_Data.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Custom group-by: headcount, or sum/mean of compensation metrics
    Groupby {
        /// Input file
        input: PathBuf,

        /// Group-by column (repeatable, order kept)
        #[arg(long = "by", required = true)]
        by: Vec<String>,

        /// Compensation metric (repeatable); without it a headcount is computed
        #[arg(long = "metric")]
        metrics: Vec<String>,

        #[arg(long, value_enum, default_value = "sum")]
        method: MethodArg,

        /// Rows with a value in this column are left out (needs --metric)
        #[arg(long, requires = "metrics")]
        exclude_flag: Option<String>,

        /// Output file (default: Customise_groupby.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "HCE_PORT")]
        port: Option<u16>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Sum,
    Mean,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Sum => Method::Sum,
            MethodArg::Mean => Method::Mean,
        }
    }
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Config error: {}", e);
            std::process::exit(1);
        }
    };

    let cli = Cli::parse();
    let settings = settings.with_current_year(cli.year);

    let result = match cli.command {
        Commands::Columns { input } => cmd_columns(&input),

        Commands::Clean {
            posdata,
            pname,
            output,
        } => cmd_clean(&settings, &posdata, &pname, output.as_deref()),

        Commands::Rdpac {
            posdata,
            pname,
            output,
        } => cmd_rdpac(&settings, &posdata, &pname, output.as_deref()),

        Commands::Groupby {
            input,
            by,
            metrics,
            method,
            exclude_flag,
            output,
        } => {
            let request = if metrics.is_empty() {
                CustomRequest::headcount(by)
            } else {
                CustomRequest::compensation(by, metrics, method.into(), exclude_flag)
            };
            cmd_groupby(&input, &request, output.as_deref())
        }

        Commands::Serve { port } => hce::server::start_server(settings.with_port(port)).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_columns(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());

    let result = load_file(input, POSDATA)?;
    if let Some(ref sheet) = result.sheet {
        eprintln!("   Sheet: {}", sheet);
    }
    if let Some(ref encoding) = result.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    eprintln!("✅ {} rows, {} columns\n", result.table.len(), result.table.width());

    for column in result.headers() {
        println!("{}", column);
    }
    Ok(())
}

fn cmd_clean(
    settings: &Settings,
    posdata: &Path,
    pname: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧹 Cleaning: {} + {}", posdata.display(), pname.display());

    let posdata = load_file(posdata, POSDATA)?;
    let pname = load_file(pname, PNAME)?;
    let download = clean_to_xlsx(&posdata.table, &pname.table, &settings.clean_options())?;

    write_download(&download, output)
}

fn cmd_rdpac(
    settings: &Settings,
    posdata: &Path,
    pname: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📊 RDPAC report: {} + {}", posdata.display(), pname.display());

    let posdata = load_file(posdata, POSDATA)?;
    let pname = load_file(pname, PNAME)?;
    let download = rdpac_to_xlsx(&posdata.table, &pname.table, &settings.clean_options())?;

    write_download(&download, output)
}

fn cmd_groupby(
    input: &Path,
    request: &CustomRequest,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔎 Group by {} over {}", request.group_by.join(", "), input.display());

    let table = load_file(input, POSDATA)?;
    let download = custom_to_xlsx(&table.table, request)?;

    write_download(&download, output)
}

fn write_download(
    download: &Download,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = output.unwrap_or_else(|| Path::new(download.file_name));
    fs::write(path, &download.bytes)?;
    eprintln!("💾 Output written to: {}", path.display());
    eprintln!("\n✨ Done!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groupby_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("posdata.csv");
        let output = dir.path().join("out.xlsx");
        fs::write(&input, "OBJECTID,SMI_CODE\n1,ORG1\n2,ORG1\n3,ORG2\n").unwrap();

        let request = CustomRequest::headcount(vec!["SMI_CODE".to_string()]);
        cmd_groupby(&input, &request, Some(&output)).unwrap();

        let written = load_file(&output, "groupby").unwrap();
        assert_eq!(written.table.len(), 2);
    }

    #[test]
    fn test_cli_parses_groupby() {
        let cli = Cli::try_parse_from([
            "hce",
            "groupby",
            "posdata.xlsx",
            "--by",
            "SMI_CODE",
            "--by",
            "Function",
            "--metric",
            "CMP1",
            "--method",
            "mean",
        ])
        .unwrap();

        match cli.command {
            Commands::Groupby { by, metrics, method, .. } => {
                assert_eq!(by, vec!["SMI_CODE", "Function"]);
                assert_eq!(metrics, vec!["CMP1"]);
                assert_eq!(Method::from(method), Method::Mean);
            }
            _ => panic!("expected groupby"),
        }
    }

    #[test]
    fn test_exclude_flag_requires_metric() {
        let result = Cli::try_parse_from([
            "hce",
            "groupby",
            "posdata.xlsx",
            "--by",
            "SMI_CODE",
            "--exclude-flag",
            "EXCL_PML",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "hce",
            "groupby",
            "posdata.xlsx",
            "--by",
            "SMI_CODE",
            "--metric",
            "CMP1",
            "--exclude-flag",
            "EXCL_PML",
        ])
        .unwrap();
        match cli.command {
            Commands::Groupby { exclude_flag, .. } => {
                assert_eq!(exclude_flag.as_deref(), Some("EXCL_PML"))
            }
            _ => panic!("expected groupby"),
        }
    }
}
