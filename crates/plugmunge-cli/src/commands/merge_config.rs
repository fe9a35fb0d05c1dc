use crate::GlobalOpts;
use anyhow::{Context, Result};
use clap::Args;
use plugmunge_config::Config;
use plugmunge_logger as logger;
use plugmunge_tree::{merge_xml, XmlDocument};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct MergeConfigArgs {
    /// Document whose content is folded in
    pub src: PathBuf,

    /// Document that is updated in place
    pub dest: PathBuf,

    /// Overwrite attributes and text that already exist in DEST
    #[arg(long)]
    pub clobber: bool,

    /// Also fold `<platform name="...">` sections of this platform
    #[arg(short, long)]
    pub platform: Option<String>,
}

pub fn handle_merge_config(args: MergeConfigArgs, _opts: &GlobalOpts) -> Result<()> {
    let config = Config::load().context("Failed to load config")?;

    let read = |path: &Path| -> Result<XmlDocument> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        XmlDocument::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    };
    let src = read(&args.src)?;
    let mut dest = read(&args.dest)?;

    merge_xml(&src.root, &mut dest.root, args.platform.as_deref(), args.clobber);

    let content = dest.to_string_indented(config.xml_indent())?;
    std::fs::write(&args.dest, content).with_context(|| format!("Failed to write {}", args.dest.display()))?;
    logger::success(&format!("Merged {} into {}", args.src.display(), args.dest.display()));
    Ok(())
}
