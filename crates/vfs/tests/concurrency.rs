//! Integration tests for concurrent use of one engine from many threads.

use std::sync::Arc;
use std::thread;

use inodefs_vfs::{FsOptions, HandleId, InodeFs, OpenMode};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

fn shared() -> Arc<InodeFs> {
    Arc::new(InodeFs::new(FsOptions::default()))
}

#[test]
fn test_engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<InodeFs>();
}

#[test]
fn test_concurrent_appends_lose_nothing() {
    let fs: Arc<InodeFs> = shared();
    fs.write_file("/log", b"").unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs: Arc<InodeFs> = Arc::clone(&fs);
            thread::spawn(move || {
                let fh: HandleId = fs.open("/log", OpenMode::Append).unwrap();
                let record: Vec<u8> = vec![b'a' + t as u8; 4];
                for _ in 0..ROUNDS {
                    fs.write(fh, &record).unwrap();
                }
                fs.close(fh).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let data: Vec<u8> = fs.read_file("/log").unwrap();
    assert_eq!(data.len(), THREADS * ROUNDS * 4);
    // Every 4-byte record is intact and each thread's bytes are all present.
    for chunk in data.chunks(4) {
        assert!(chunk.iter().all(|&b| b == chunk[0]));
    }
    for t in 0..THREADS {
        let marker: u8 = b'a' + t as u8;
        let count: usize = data.iter().filter(|&&b| b == marker).count();
        assert_eq!(count, ROUNDS * 4);
    }
}

#[test]
fn test_concurrent_creates_in_one_directory() {
    let fs: Arc<InodeFs> = shared();
    fs.mkdir("/d").unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs: Arc<InodeFs> = Arc::clone(&fs);
            thread::spawn(move || {
                for i in 0..ROUNDS / 10 {
                    let path: String = format!("/d/f-{}-{}", t, i);
                    fs.write_file(&path, path.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let names: Vec<String> = fs.list_dir("/d").unwrap();
    assert_eq!(names.len(), THREADS * (ROUNDS / 10));
    for name in names {
        let path: String = format!("/d/{}", name);
        assert_eq!(fs.read_file(&path).unwrap(), path.as_bytes());
    }
}

#[test]
fn test_same_name_race_has_one_winner() {
    let fs: Arc<InodeFs> = shared();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let fs: Arc<InodeFs> = Arc::clone(&fs);
            thread::spawn(move || fs.mkdir("/contested").is_ok())
        })
        .collect();
    let wins: usize = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|&won| won)
        .count();

    assert_eq!(wins, 1);
    assert!(fs.is_dir("/contested"));
}

#[test]
fn test_readers_see_whole_writes() {
    let fs: Arc<InodeFs> = shared();
    let old: Vec<u8> = vec![b'o'; 1024];
    let new: Vec<u8> = vec![b'n'; 1024];
    fs.write_file("/f", &old).unwrap();

    let writer = {
        let fs: Arc<InodeFs> = Arc::clone(&fs);
        thread::spawn(move || {
            for i in 0..ROUNDS {
                let payload: &[u8] = if i % 2 == 0 { &new } else { &old };
                fs.write_file("/f", payload).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..THREADS / 2)
        .map(|_| {
            let fs: Arc<InodeFs> = Arc::clone(&fs);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let fh: HandleId = fs.open("/f", OpenMode::Read).unwrap();
                    let data: Vec<u8> = fs.read_at(fh, 0, 2048).unwrap();
                    fs.close(fh).unwrap();
                    if let Some(&first) = data.first() {
                        assert!(data.iter().all(|&b| b == first));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_shared_handle_cursor_advances_once_per_write() {
    let fs: Arc<InodeFs> = shared();
    let fh: HandleId = fs.create("/f").unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let fs: Arc<InodeFs> = Arc::clone(&fs);
            thread::spawn(move || {
                for _ in 0..ROUNDS / 10 {
                    fs.write(fh, b"xy").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    fs.close(fh).unwrap();

    assert_eq!(
        fs.stat("/f").unwrap().size,
        (THREADS * (ROUNDS / 10) * 2) as u64
    );
}
