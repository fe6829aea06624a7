//! Example: drive the filesystem engine through a scripted workload.
//!
//! Usage:
//!   cargo run -p inodefs-vfs --example exercise -- [options]
//!
//! Options:
//!   --snapshot <path>     Restore from and save to a snapshot file
//!   --block-size <bytes>  Use the block backend with this block size
//!   --max-blocks <n>      Block pool size (default: 500)
//!   --max-inodes <n>      Inode limit (default: unbounded)
//!
//! Example:
//!   RUST_LOG=debug cargo run -p inodefs-vfs --example exercise -- \
//!       --snapshot /tmp/inodefs.json --block-size 2500

use std::path::PathBuf;

use inodefs_vfs::{FsError, FsOptions, FsStats, HandleId, InodeFs, OpenMode};

/// CLI arguments for the exercise example.
struct CliArgs {
    snapshot: Option<PathBuf>,
    block_size: Option<usize>,
    max_blocks: usize,
    max_inodes: Option<usize>,
}

impl CliArgs {
    /// Parse CLI arguments.
    ///
    /// # Returns
    /// Parsed CLI arguments or None if help was requested or args invalid.
    fn parse() -> Option<Self> {
        let args: Vec<String> = std::env::args().collect();

        if args.iter().any(|a| a == "--help" || a == "-h") {
            Self::print_usage(&args[0]);
            return None;
        }

        let mut snapshot: Option<PathBuf> = None;
        let mut block_size: Option<usize> = None;
        let mut max_blocks: usize = 500;
        let mut max_inodes: Option<usize> = None;

        let mut i: usize = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--snapshot" => {
                    i += 1;
                    snapshot = Some(PathBuf::from(args.get(i)?));
                }
                "--block-size" => {
                    i += 1;
                    block_size = Some(args.get(i)?.parse().ok()?);
                }
                "--max-blocks" => {
                    i += 1;
                    max_blocks = args.get(i)?.parse().ok()?;
                }
                "--max-inodes" => {
                    i += 1;
                    max_inodes = Some(args.get(i)?.parse().ok()?);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    Self::print_usage(&args[0]);
                    return None;
                }
            }
            i += 1;
        }

        Some(Self {
            snapshot,
            block_size,
            max_blocks,
            max_inodes,
        })
    }

    /// Print usage information.
    ///
    /// # Arguments
    /// * `program` - Program name for usage message
    fn print_usage(program: &str) {
        eprintln!("Usage: {} [options]", program);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --snapshot <path>     Restore from and save to a snapshot file");
        eprintln!("  --block-size <bytes>  Use the block backend with this block size");
        eprintln!("  --max-blocks <n>      Block pool size (default: 500)");
        eprintln!("  --max-inodes <n>      Inode limit (default: unbounded)");
    }

    fn options(&self) -> FsOptions {
        let mut options: FsOptions = FsOptions::default();
        if let Some(path) = &self.snapshot {
            options = options.with_snapshot_path(path.clone());
        }
        if let Some(block_size) = self.block_size {
            options = options.with_blocks(block_size, self.max_blocks);
        }
        if let Some(max_inodes) = self.max_inodes {
            options = options.with_max_inodes(max_inodes);
        }
        options
    }
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Run the workload under `/work`, leaving a couple of files behind so a
/// snapshot has something to carry.
fn run(fs: &InodeFs) -> Result<(), FsError> {
    if !fs.exists("/work") {
        fs.mkdir("/work")?;
    }

    fs.mkdir("/work/d1")?;
    fs.mkdir("/work/d1/d2")?;
    fs.mkdir("/work/d1/d2/d3")?;
    let fh: HandleId = fs.create("/work/d1/d2/d3/test_file5.py")?;
    fs.close(fh)?;
    if let Err(e) = fs.rmdir("/work/d1") {
        println!("rmdir /work/d1 before emptying: {} (errno {})", e, e.errno());
    }
    fs.unlink("/work/d1/d2/d3/test_file5.py")?;
    fs.rmdir("/work/d1/d2/d3")?;
    fs.rmdir("/work/d1/d2")?;
    fs.rmdir("/work/d1")?;

    fs.write_file("/work/greeting.txt", b"Hello")?;
    fs.append_file("/work/greeting.txt", b" World")?;
    fs.link("/work/greeting.txt", "/work/alias.txt")?;
    fs.append_file("/work/alias.txt", b"!")?;

    let fh: HandleId = fs.open("/work/greeting.txt", OpenMode::Read)?;
    let text: Vec<u8> = fs.read_to_end(fh)?;
    fs.close(fh)?;
    println!(
        "greeting.txt: {:?} (links: {})",
        String::from_utf8_lossy(&text),
        fs.stat("/work/greeting.txt")?.link_count
    );

    fs.write_file("/work/large.bin", &vec![b'A'; 5000])?;
    println!("large.bin: {} bytes", fs.stat("/work/large.bin")?.size);
    fs.unlink("/work/large.bin")?;
    fs.unlink("/work/alias.txt")?;

    println!("/work: {:?}", fs.list_dir("/work")?);
    Ok(())
}

fn print_stats(stats: &FsStats) {
    println!("Inodes:       {}", stats.inode_count);
    println!("Open handles: {}", stats.open_handles);
    println!("Stored:       {}", format_bytes(stats.bytes_stored));
    println!("Uptime:       {}s", stats.uptime_secs);
}

fn main() {
    tracing_subscriber::fmt::init();

    let Some(args) = CliArgs::parse() else {
        std::process::exit(1);
    };

    let fs: InodeFs = match InodeFs::load(args.options()) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("Failed to open filesystem: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.snapshot {
        println!("Snapshot: {}", path.display());
    }

    if let Err(e) = run(&fs) {
        eprintln!("Workload failed: {} (errno {})", e, e.errno());
        std::process::exit(1);
    }

    match fs.shutdown() {
        Ok(stats) => print_stats(&stats),
        Err(e) => {
            eprintln!("Shutdown failed: {}", e);
            std::process::exit(1);
        }
    }
}
