use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mp4ilst::ilst::schema;
use mp4ilst::{Error, ItemList, TempPaths};

#[derive(Parser)]
#[command(name = "mp4ilst")]
#[command(version, about = "Read and rewrite iTunes-style MP4 metadata (moov.udta.meta.ilst)")]
pub struct Cli {
    /// Enable debug logs
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the tags stored in a file
    Probe {
        /// Source file
        #[arg(short, long)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a copy of a file with tags changed or removed
    Modify {
        /// Source file (never modified)
        #[arg(short, long)]
        file: PathBuf,

        /// Destination file
        #[arg(short, long)]
        out: PathBuf,

        /// First intermediate file [default: <OUT>.tmp]
        #[arg(long)]
        tmp: Option<PathBuf>,

        /// Second intermediate file [default: <OUT>.tmp2]
        #[arg(long)]
        tmp2: Option<PathBuf>,

        /// Keep the intermediate files
        #[arg(long)]
        keep: bool,

        /// Tag to write, e.g. -d '(c)nam="New Title"' or -d trkn=3/12
        #[arg(short = 'd', long = "data", value_name = "ID=VALUE")]
        data: Vec<String>,

        /// Tag to remove
        #[arg(short = 'r', long = "rm", value_name = "ID")]
        rm: Vec<String>,
    },
}

/// Reject `modify` paths that would overwrite the source or each other
pub fn check_paths(file: &Path, out: &Path, temp: &TempPaths) -> Result<()> {
    let (tmp, tmp2) = (temp.tmp.as_path(), temp.tmp2.as_path());
    if out == file {
        bail!("CLI option `--out` and `--file` cannot be same");
    }
    if tmp == file || tmp2 == file {
        bail!("CLI option `--tmp`/`--tmp2` and `--file` cannot be same");
    }
    if out == tmp || out == tmp2 {
        bail!("CLI option `--out` and `--tmp`/`--tmp2` cannot be same");
    }
    if tmp == tmp2 {
        bail!("CLI option `--tmp` and `--tmp2` cannot be same");
    }
    Ok(())
}

/// Turn `id=value` and removal arguments into the write request
pub fn parse_changes(data: &[String], rm: &[String]) -> Result<(ItemList, Vec<String>)> {
    let mut tags = ItemList::new();
    for arg in data {
        let Some((id, value)) = arg.split_once('=') else {
            bail!("CLI option `--data`,`-d` expects <id>=<value>, got {:?}", arg);
        };
        let id = id.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        let spec = schema::find(id)
            .ok_or_else(|| Error::UnknownTag(id.to_string()))
            .context("CLI option `--data`,`-d`")?;
        let value = spec
            .kind
            .parse(value)
            .map_err(|source| Error::InvalidValue {
                id: id.to_string(),
                source,
            })
            .context("CLI option `--data`,`-d`")?;
        tags.set(spec.id, value)?;
    }

    for id in rm {
        if !schema::is_known(id) {
            return Err(Error::UnknownTag(id.clone())).context("CLI option `--rm`,`-r`");
        }
    }

    Ok((tags, rm.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp4ilst::{InternationalText, TagValue};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn library_error(result: Result<(ItemList, Vec<String>)>) -> Option<Error> {
        result.err()?.downcast::<Error>().ok()
    }

    #[test]
    fn test_parse_changes() {
        let (tags, rm) = parse_changes(
            &args(&["(c)nam=\"New Title\"", "trkn=3/12", "cpil=true", "gnre=8"]),
            &args(&["(c)cmt"]),
        )
        .unwrap();

        assert_eq!(
            tags.get("(c)nam"),
            Some(&TagValue::Text(InternationalText::new("New Title")))
        );
        assert_eq!(
            tags.get("trkn"),
            Some(&TagValue::TrackNumber { number: 3, total: 12 })
        );
        assert_eq!(tags.get("cpil"), Some(&TagValue::Bool(true)));
        assert_eq!(tags.get("gnre"), Some(&TagValue::Genre(8)));
        assert_eq!(rm, vec!["(c)cmt".to_string()]);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let (tags, _) = parse_changes(&args(&["(c)cmt=a=b"]), &[]).unwrap();
        assert_eq!(
            tags.get("(c)cmt"),
            Some(&TagValue::Text(InternationalText::new("a=b")))
        );
    }

    #[test]
    fn test_only_one_quote_pair_is_stripped() {
        let (tags, _) = parse_changes(&args(&["(c)cmt=\"\"quoted\"\"", "(c)nam=\"open"]), &[]).unwrap();
        assert_eq!(
            tags.get("(c)cmt"),
            Some(&TagValue::Text(InternationalText::new("\"quoted\"")))
        );
        assert_eq!(
            tags.get("(c)nam"),
            Some(&TagValue::Text(InternationalText::new("\"open")))
        );
    }

    #[test]
    fn test_check_paths() {
        let file = Path::new("in.m4a");
        let out = Path::new("out.m4a");
        assert!(check_paths(file, out, &TempPaths::beside(out)).is_ok());

        let rejected = [
            (out, TempPaths::beside(out)),
            (file, TempPaths::new("in.m4a", "b.tmp")),
            (file, TempPaths::new("a.tmp", "in.m4a")),
            (file, TempPaths::new("out.m4a", "b.tmp")),
            (file, TempPaths::new("a.tmp", "a.tmp")),
        ];
        for (file, temp) in &rejected {
            assert!(check_paths(file, out, temp).is_err(), "{:?} {:?}", file, temp);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            library_error(parse_changes(&args(&["nope=1"]), &[])),
            Some(Error::UnknownTag(_))
        ));
        assert!(matches!(
            library_error(parse_changes(&args(&["tmpo=fast"]), &[])),
            Some(Error::InvalidValue { id, .. }) if id == "tmpo"
        ));
        assert!(matches!(
            library_error(parse_changes(&args(&["covr=cover.jpg"]), &[])),
            Some(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            library_error(parse_changes(&[], &args(&["xxxx"]))),
            Some(Error::UnknownTag(id)) if id == "xxxx"
        ));

        let err = parse_changes(&args(&["(c)nam"]), &[]).unwrap_err();
        assert!(err.to_string().contains("<id>=<value>"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from([
            "mp4ilst", "modify", "-f", "in.m4a", "-o", "out.m4a", "-d", "tmpo=120", "-r", "(c)cmt",
            "--keep",
        ]);
        match cli.command {
            Commands::Modify { data, rm, keep, tmp, .. } => {
                assert_eq!(data, vec!["tmpo=120".to_string()]);
                assert_eq!(rm, vec!["(c)cmt".to_string()]);
                assert!(keep);
                assert!(tmp.is_none());
            }
            Commands::Probe { .. } => panic!("parsed the wrong subcommand"),
        }
    }
}
