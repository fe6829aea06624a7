//! Integration tests for hard links and link counting.

use inodefs_vfs::{FsError, FsOptions, HandleId, InodeFs, Metadata, OpenMode};

fn fs_with_file(path: &str, data: &[u8]) -> InodeFs {
    let fs: InodeFs = InodeFs::new(FsOptions::default());
    fs.mkdir("/mnt").unwrap();
    fs.write_file(path, data).unwrap();
    fs
}

// =============================================================================
// ALIASING TESTS
// =============================================================================

mod aliasing {
    use super::*;

    #[test]
    fn test_hard_links() {
        let fs: InodeFs = fs_with_file("/mnt/test_file4.txt", b"Original content");
        fs.link("/mnt/test_file4.txt", "/mnt/hard_link_test_file4.txt")
            .unwrap();

        assert!(fs.is_file("/mnt/hard_link_test_file4.txt"));
        assert_eq!(
            fs.read_file("/mnt/hard_link_test_file4.txt").unwrap(),
            fs.read_file("/mnt/test_file4.txt").unwrap()
        );

        fs.append_file("/mnt/test_file4.txt", b"\nAppended content")
            .unwrap();
        assert_eq!(
            fs.read_file("/mnt/hard_link_test_file4.txt").unwrap(),
            b"Original content\nAppended content"
        );

        fs.unlink("/mnt/hard_link_test_file4.txt").unwrap();
        assert!(!fs.exists("/mnt/hard_link_test_file4.txt"));
        assert!(fs.exists("/mnt/test_file4.txt"));
        assert_eq!(
            fs.read_file("/mnt/test_file4.txt").unwrap(),
            b"Original content\nAppended content"
        );
    }

    #[test]
    fn test_links_share_inode() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"x");
        fs.mkdir("/mnt/sub").unwrap();
        fs.link("/mnt/a", "/mnt/sub/b").unwrap();

        let a: Metadata = fs.stat("/mnt/a").unwrap();
        let b: Metadata = fs.stat("/mnt/sub/b").unwrap();
        assert_eq!(a.ino, b.ino);
        assert_eq!(a.link_count, 2);
        assert_eq!(b.link_count, 2);
    }

    #[test]
    fn test_truncate_through_other_name() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"Hello World");
        fs.link("/mnt/a", "/mnt/b").unwrap();

        fs.write_file("/mnt/b", b"new").unwrap();
        assert_eq!(fs.read_file("/mnt/a").unwrap(), b"new");
        assert_eq!(fs.stat("/mnt/a").unwrap().size, 3);
    }
}

// =============================================================================
// LINK COUNT TESTS
// =============================================================================

mod link_count {
    use super::*;

    #[test]
    fn test_count_tracks_names() {
        let fs: InodeFs = fs_with_file("/mnt/f", b"data");
        assert_eq!(fs.stat("/mnt/f").unwrap().link_count, 1);

        fs.link("/mnt/f", "/mnt/g").unwrap();
        fs.link("/mnt/g", "/mnt/h").unwrap();
        assert_eq!(fs.stat("/mnt/f").unwrap().link_count, 3);

        fs.unlink("/mnt/f").unwrap();
        assert_eq!(fs.stat("/mnt/h").unwrap().link_count, 2);
    }

    #[test]
    fn test_last_unlink_destroys_content() {
        let fs: InodeFs = fs_with_file("/mnt/f", b"12345");
        fs.link("/mnt/f", "/mnt/g").unwrap();
        let inodes_before: usize = fs.stats().inode_count;

        fs.unlink("/mnt/f").unwrap();
        assert_eq!(fs.stats().bytes_stored, 5);

        fs.unlink("/mnt/g").unwrap();
        assert_eq!(fs.stats().bytes_stored, 0);
        assert_eq!(fs.stats().inode_count, inodes_before - 1);
    }

    #[test]
    fn test_directory_link_count_is_one() {
        let fs: InodeFs = InodeFs::new(FsOptions::default());
        fs.mkdir("/d").unwrap();
        fs.mkdir("/d/e").unwrap();
        assert_eq!(fs.stat("/d").unwrap().link_count, 1);
    }
}

// =============================================================================
// OPEN HANDLE TESTS
// =============================================================================

mod open_handles {
    use super::*;

    #[test]
    fn test_handle_survives_unlink_of_other_name() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"abc");
        fs.link("/mnt/a", "/mnt/b").unwrap();

        let fh: HandleId = fs.open("/mnt/b", OpenMode::Read).unwrap();
        fs.unlink("/mnt/a").unwrap();
        assert_eq!(fs.read_to_end(fh).unwrap(), b"abc");
    }

    #[test]
    fn test_handle_to_destroyed_inode() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"abc");
        let fh: HandleId = fs.open("/mnt/a", OpenMode::Read).unwrap();
        fs.unlink("/mnt/a").unwrap();

        assert!(matches!(fs.read(fh, 3), Err(FsError::BadHandle(h)) if h == fh));
        fs.close(fh).unwrap();
    }
}

// =============================================================================
// ERROR TESTS
// =============================================================================

mod errors {
    use super::*;

    #[test]
    fn test_link_to_existing_name() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"");
        fs.write_file("/mnt/b", b"").unwrap();
        assert!(matches!(
            fs.link("/mnt/a", "/mnt/b"),
            Err(FsError::AlreadyExists(_))
        ));
        assert_eq!(fs.stat("/mnt/a").unwrap().link_count, 1);
    }

    #[test]
    fn test_link_directory() {
        let fs: InodeFs = InodeFs::new(FsOptions::default());
        fs.mkdir("/d").unwrap();
        assert!(matches!(
            fs.link("/d", "/e"),
            Err(FsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_link_missing_source() {
        let fs: InodeFs = InodeFs::new(FsOptions::default());
        assert!(matches!(
            fs.link("/nope", "/e"),
            Err(FsError::NotFound(_))
        ));
        assert!(!fs.exists("/e"));
    }

    #[test]
    fn test_link_into_missing_directory() {
        let fs: InodeFs = fs_with_file("/mnt/a", b"");
        assert!(matches!(
            fs.link("/mnt/a", "/nope/b"),
            Err(FsError::NotFound(_))
        ));
        assert_eq!(fs.stat("/mnt/a").unwrap().link_count, 1);
    }
}
