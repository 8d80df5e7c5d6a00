use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::job::JOB_NAME_ARG;

/// Convert a cataloged dataset into Parquet files in object storage
#[derive(Debug, Parser)]
#[command(name = "catalog2parquet")]
#[command(version)]
#[command(about = "Convert a cataloged dataset into Parquet files in object storage", long_about = None)]
pub struct Cli {
    /// Name of this job, recorded with every run
    #[arg(long = "JOB_NAME", value_name = "NAME")]
    pub job_name: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Additional job argument (repeatable)
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub args: Vec<(String, String)>,
}

impl Cli {
    /// Named arguments handed to the job context. `--JOB_NAME` wins over an
    /// `--arg JOB_NAME=...` pair.
    pub fn job_arguments(&self) -> HashMap<String, String> {
        let mut arguments: HashMap<String, String> = self.args.iter().cloned().collect();
        if let Some(job_name) = &self.job_name {
            arguments.insert(JOB_NAME_ARG.to_string(), job_name.clone());
        }
        arguments
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}
