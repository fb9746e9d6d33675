use argh::FromArgs;
use colored::Colorize;
use ps1_memcard::{CardFormat, SaveFormat};
use ps1vmc::{resolve_config, Error, Session};
use std::path::PathBuf;

#[derive(FromArgs)]
/// Inspect and edit PS1 memory card images.
struct Args {
    /// memory card image (raw, gme, vgs or vmp)
    #[argh(positional)]
    card: PathBuf,

    /// config file, defaults to ps1vmc.toml next to the card
    #[argh(option)]
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Create(CreateArgs),
    Info(InfoArgs),
    Free(FreeArgs),
    List(ListArgs),
    Format(FormatArgs),
    Remove(RemoveArgs),
    Toggle(ToggleArgs),
    Image(ImageArgs),
    Inject(InjectArgs),
    Export(ExportArgs),
    Comment(CommentArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "create")]
/// Write a new formatted card.
struct CreateArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "info")]
/// Show the card format and block usage.
struct InfoArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "free")]
/// Print the number of free blocks.
struct FreeArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
/// List every slot.
struct ListArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "format")]
/// Free every slot.
struct FormatArgs {}

#[derive(FromArgs)]
#[argh(subcommand, name = "remove")]
/// Free the save starting at a slot.
struct RemoveArgs {
    /// slot index (0-14)
    #[argh(positional)]
    slot: usize,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "toggle")]
/// Delete or restore the save starting at a slot.
struct ToggleArgs {
    /// slot index (0-14)
    #[argh(positional)]
    slot: usize,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "image")]
/// Write the card in another wrapper.
struct ImageArgs {
    /// target format: raw, gme, vgs or vmp
    #[argh(positional)]
    format: CardFormat,

    /// output path, defaults to the card path with the format's extension
    #[argh(positional)]
    output: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "inject")]
/// Import a single save file (mcs, raw, psv or action replay).
struct InjectArgs {
    /// save file
    #[argh(positional)]
    save: PathBuf,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "export")]
/// Export the save starting at a slot.
struct ExportArgs {
    /// slot index (0-14)
    #[argh(positional)]
    slot: usize,

    /// save format: mcs, raw, psx or psv
    #[argh(option, default = "SaveFormat::Mcs")]
    format: SaveFormat,

    /// output path, defaults to the save name in the export directory
    #[argh(positional)]
    output: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "comment")]
/// Set the GME comment of a slot.
struct CommentArgs {
    /// slot index (0-14)
    #[argh(positional)]
    slot: usize,

    /// comment text
    #[argh(positional)]
    text: String,
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();

    if let Err(err) = run(args) {
        eprintln!("{} {err}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let config = resolve_config(&args.card, args.config.as_deref())?;

    let mut session = match &args.command {
        Command::Create(_) => Session::create(&args.card, config),
        _ => Session::open(&args.card, config)?,
    };

    match args.command {
        Command::Create(_) => session.commit()?,
        Command::Info(_) => session.print_info(),
        Command::Free(_) => session.print_free(),
        Command::List(_) => session.print_list(),
        Command::Format(_) => {
            session.format_card();
            session.commit()?;
        }
        Command::Remove(RemoveArgs { slot }) => {
            session.remove(slot)?;
            session.commit()?;
        }
        Command::Toggle(ToggleArgs { slot }) => {
            session.toggle(slot)?;
            session.commit()?;
        }
        Command::Image(ImageArgs { format, output }) => {
            let output =
                output.unwrap_or_else(|| session.path().with_extension(format.extension()));
            session.write_image(&output, format)?;
        }
        Command::Inject(InjectArgs { save }) => {
            session.inject(&save)?;
            session.commit()?;
        }
        Command::Export(ExportArgs {
            slot,
            format,
            output,
        }) => {
            session.export(slot, format, output.as_deref())?;
        }
        Command::Comment(CommentArgs { slot, text }) => {
            session.set_comment(slot, &text)?;
            session.commit()?;
        }
    }

    Ok(())
}
