//! mptt-demo - 构建示例 "Food" 树并输出
//!
//! 默认在内存中建树；指定 `--snapshot` 时从快照加载（文件不存在则建树后写入）

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mptt::{ListType, MemoryStore, Mptt, MpttConfig, NodeId, TreeNode, DEFAULT_SEPARATOR, ROOT};
use tracing_subscriber::EnvFilter;

/// Nested-set tree demo
#[derive(Parser, Debug)]
#[command(name = "mptt-demo", version, about = "Build and print a sample nested-set tree")]
struct Args {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "tree")]
    output: OutputFormat,

    /// Print only what lies below this node id (0 = everything)
    #[arg(short = 'n', long, default_value_t = ROOT)]
    node: NodeId,

    /// Depth marker for `select` output
    #[arg(long, default_value = DEFAULT_SEPARATOR)]
    separator: String,

    /// Table and column names (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Snapshot to load; created with the sample tree when missing
    #[arg(short = 's', long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Indented outline with bounds
    Tree,
    /// Flat `(id, label)` options
    Select,
    /// Nested HTML list
    List,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => MpttConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MpttConfig::default(),
    };

    let mut tree = open_tree(&args, config)?;

    match args.output {
        OutputFormat::Tree => {
            for item in tree.get_tree(args.node)? {
                print_outline(&item, 0);
            }
        }
        OutputFormat::Select => {
            for (id, label) in tree.to_select(args.node, &args.separator)? {
                println!("{:>4}  {}", id, label);
            }
        }
        OutputFormat::List => {
            println!("{}", tree.to_list(args.node, ListType::Unordered, "class=\"tree\"")?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mptt=debug,mptt_demo=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mptt=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn open_tree(args: &Args, config: MpttConfig) -> Result<Mptt<MemoryStore>> {
    if let Some(path) = args.snapshot.as_ref().filter(|p| p.exists()) {
        let store = MemoryStore::open_snapshot(path)
            .with_context(|| format!("opening snapshot {}", path.display()))?;
        return Ok(Mptt::new(store, config)?);
    }

    let store = MemoryStore::new();
    store.install(&config)?;
    let mut tree = Mptt::new(store, config)?;
    build_food(&mut tree)?;

    if let Some(path) = &args.snapshot {
        tree.store()
            .save_snapshot(path)
            .with_context(|| format!("saving snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "sample tree saved");
    }

    Ok(tree)
}

/// Food → Fruit{Red{Cherry}, Yellow{Banana}}, Meat{Beef, Pork}
fn build_food(tree: &mut Mptt<MemoryStore>) -> mptt::Result<()> {
    let food = tree.add(ROOT, "Food", None)?;

    let fruit = tree.add(food, "Fruit", None)?;
    let red = tree.add(fruit, "Red", None)?;
    tree.add(red, "Cherry", None)?;
    let yellow = tree.add(fruit, "Yellow", None)?;
    tree.add(yellow, "Banana", None)?;

    let meat = tree.add(food, "Meat", None)?;
    tree.add(meat, "Beef", None)?;
    tree.add(meat, "Pork", None)?;

    Ok(())
}

fn print_outline(item: &TreeNode, depth: usize) {
    println!(
        "{}{} [{}, {}] #{}",
        "  ".repeat(depth),
        item.node.title,
        item.node.left,
        item.node.right,
        item.node.id
    );
    for child in &item.children {
        print_outline(child, depth + 1);
    }
}
