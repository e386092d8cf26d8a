//! hostcat: CLI for categorising URLs, domains and IPs against blocklists.

use clap::{Parser, Subcommand};
use hostcat::converter::parse_auto;
use hostcat::dataset::{ColumnMappings, ProcessOptions};
use hostcat::{Client, Config};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hostcat")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Categorise URLs, domains and IPs against blocklists", long_about = None)]
struct Cli {
    /// YAML or JSON configuration file
    #[arg(short, long, global = true, default_value = "hostcat.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorise URLs or domains
    Categorise {
        /// URLs or bare domains
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Also categorise the addresses each domain resolves to
        #[arg(short, long)]
        resolve: bool,
    },

    /// Categorise IP addresses
    Ip {
        #[arg(required = true)]
        ips: Vec<String>,
    },

    /// Print the hosts of a category
    Hosts {
        category: String,
    },

    /// Detect the format of local list files
    Formats {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge a CSV dataset and print the resulting categories
    DatasetCsv {
        /// CSV URL, file:// URL or local path
        url: String,

        /// Column holding URLs or domains
        #[arg(long)]
        url_column: Option<String>,

        /// Column holding category labels
        #[arg(long)]
        category_column: Option<String>,

        /// Ignore the processed-row cache
        #[arg(long)]
        no_cache: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Categorise { inputs, resolve } => categorise(&cli.config, &inputs, resolve),
        Commands::Ip { ips } => categorise_ips(&cli.config, &ips),
        Commands::Hosts { category } => print_hosts(&cli.config, &category),
        Commands::Formats { files } => detect_formats(&files),
        Commands::DatasetCsv {
            url,
            url_column,
            category_column,
            no_cache,
        } => {
            let mappings = ColumnMappings {
                url_column,
                category_column,
                ..ColumnMappings::default()
            };
            load_dataset(&cli.config, &url, &mappings, no_cache)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn client(config_path: &Path) -> Result<Client, Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    Ok(Client::new(config)?)
}

fn format_categories(categories: &[String]) -> String {
    if categories.is_empty() {
        "-".to_string()
    } else {
        categories.join(",")
    }
}

fn categorise(config_path: &Path, inputs: &[String], resolve: bool) -> CliResult {
    let client = client(config_path)?;
    for input in inputs {
        let categories = if resolve {
            client.resolve_and_categorise(input)
        } else {
            client.categorise(input)
        };
        match categories {
            Ok(categories) => println!("{}\t{}", input, format_categories(&categories)),
            Err(e) => eprintln!("{}\t{}", input, e),
        }
    }
    Ok(())
}

fn categorise_ips(config_path: &Path, ips: &[String]) -> CliResult {
    let client = client(config_path)?;
    for ip in ips {
        println!("{}\t{}", ip, format_categories(&client.categorise_ip(ip)));
    }
    Ok(())
}

fn print_hosts(config_path: &Path, category: &str) -> CliResult {
    let client = client(config_path)?;
    let hosts = client
        .hosts(category)
        .ok_or_else(|| format!("unknown category {:?}", category))?;
    for host in hosts {
        println!("{}", host);
    }
    Ok(())
}

fn detect_formats(files: &[PathBuf]) -> CliResult {
    for file in files {
        let content = fs::read_to_string(file)?;
        let (format, hosts) = parse_auto(&content);
        println!("{}\t{}\t{} hosts", file.display(), format, hosts.len());
    }
    Ok(())
}

fn load_dataset(config_path: &Path, url: &str, mappings: &ColumnMappings, no_cache: bool) -> CliResult {
    let mut client = client(config_path)?;
    let options = ProcessOptions {
        use_cache: !no_cache,
        ..ProcessOptions::default()
    };
    let result = client.load_csv_dataset(url, &options, mappings)?;

    println!(
        "{} ({} rows, sha256 {})",
        result.metadata.identifier, result.metadata.total_entries, result.metadata.content_hash
    );
    for (category, domains) in &result.categories {
        println!("  {}: {} domains", category, domains.len());
    }

    let stats = client.stats();
    println!(
        "Graph: {} blocklist hosts in {} categories, {} dataset hosts in {} categories",
        stats.blocklist_hosts, stats.blocklist_categories, stats.dataset_hosts, stats.dataset_categories
    );
    Ok(())
}
