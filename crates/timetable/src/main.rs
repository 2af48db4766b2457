use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use timetable::{compile_calendar, extract_report, FileSource, PipelineConfig, PortalSource};
use tracing::{debug, info, warn, Level};

/// Converts an HTML class timetable into an iCalendar file.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Timetable HTML file. Not needed with --portal.
    #[arg(required_unless_present = "portal")]
    input: Option<PathBuf>,

    /// Where to write the .ics file
    #[arg(short, long)]
    output: PathBuf,

    /// JSON configuration file
    #[arg(short, long, env = "TIMETABLE_CONFIG")]
    config: Option<PathBuf>,

    /// Download the timetable from the portal instead of reading a file
    #[arg(long, conflicts_with = "input", requires = "user")]
    portal: bool,

    /// Portal user name
    #[arg(long, env = "TIMETABLE_USER")]
    user: Option<String>,

    /// Portal password
    #[arg(long, env = "TIMETABLE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Produce an empty calendar instead of failing when the page has no tables
    #[arg(long)]
    allow_empty: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.allow_empty |= args.allow_empty;
    config.validate()?;

    check_output_path(&args.output)?;

    info!("Phase 1: Read courses");
    let source = if args.portal {
        let user = args.user.clone().unwrap_or_default();
        let Some(password) = args.password.clone() else {
            bail!("--portal needs a password (--password or TIMETABLE_PASSWORD)");
        };
        PortalSource::new(config.portal.clone(), user, password)?
            .fetch()
            .await
            .context("downloading timetable from portal")?
    } else {
        let Some(input) = &args.input else {
            bail!("no timetable file given");
        };
        FileSource::new(input)
            .fetch()
            .with_context(|| format!("opening timetable {}", input.display()))?
    };

    let report = extract_report(source, &config).context("reading courses")?;
    for course in &report.courses {
        info!("{}({})", course.title(), course.session_type());
        debug!("{}", course);
    }
    if !report.skipped.is_empty() {
        warn!("Skipped {} table elements", report.skipped.len());
    }
    info!("Found {} courses", report.courses.len());

    info!("Phase 2: Converting courses to iCal");
    let calendar = compile_calendar(&report.courses, &config).context("compiling calendar")?;
    let ics = calendar.to_ics();

    info!("Phase 3: Saving iCal to {}", args.output.display());
    write_atomically(&args.output, &ics)?;

    info!("Finished");
    Ok(())
}

/// Fails early if the calendar could not be written to `path`.
fn check_output_path(path: &Path) -> anyhow::Result<()> {
    if path.is_dir() {
        bail!("invalid calendar output path: {} is a directory", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            bail!(
                "invalid calendar output path: directory {} does not exist",
                parent.display()
            );
        }
    }
    Ok(())
}

/// Writes next to the target and renames, so a failed run never leaves a
/// truncated calendar behind.
fn write_atomically(path: &Path, contents: &str) -> anyhow::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_file_invocation() {
        let args = Args::try_parse_from(["timetable", "plan.html", "-o", "plan.ics"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("plan.html")));
        assert_eq!(args.output, PathBuf::from("plan.ics"));
        assert!(!args.portal);
    }

    #[test]
    fn test_output_is_a_named_option() {
        assert!(Args::try_parse_from(["timetable", "plan.html", "plan.ics"]).is_err());
        let args =
            Args::try_parse_from(["timetable", "plan.html", "--output", "plan.ics"]).unwrap();
        assert_eq!(args.output, PathBuf::from("plan.ics"));
    }

    #[test]
    fn test_portal_requires_user() {
        assert!(Args::try_parse_from(["timetable", "--portal", "-o", "plan.ics"]).is_err());
        assert!(
            Args::try_parse_from(["timetable", "--portal", "--user", "s1", "-o", "plan.ics"]).is_ok()
        );
    }

    #[test]
    fn test_check_output_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_output_path(dir.path()).is_err());
        assert!(check_output_path(&dir.path().join("missing").join("plan.ics")).is_err());
        assert!(check_output_path(&dir.path().join("plan.ics")).is_ok());
    }

    #[test]
    fn test_write_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.ics");
        write_atomically(&path, "BEGIN:VCALENDAR\r\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "BEGIN:VCALENDAR\r\n");
        assert!(!dir.path().join("plan.ics.tmp").exists());
    }
}
