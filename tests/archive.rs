use zipdrop::zip::CompressionMethod;
use zipdrop::{ArchiveSet, LocalFileReader, MemoryReader, ZipArchive, find_entries};

mod common;

use common::{Item, build_zip, noise, write_archive};

#[tokio::test]
async fn lists_entries_in_archive_order() {
    let data = noise(700);
    let bytes = build_zip(&[
        Item::Dir("pics/"),
        Item::Deflated("pics/card.png", &data),
        Item::Stored("readme.txt", b"hi"),
    ]);

    let archive = ZipArchive::open(MemoryReader::new(bytes)).await.unwrap();
    let names: Vec<_> = archive.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["pics/", "pics/card.png", "readme.txt"]);

    let card = &archive.entries()[1];
    assert!(!card.is_directory);
    assert_eq!(card.compression, CompressionMethod::Deflate);
    assert_eq!(card.uncompressed_size, 700);
    assert_eq!(card.segments(), vec!["pics", "card.png"]);
    assert!(archive.entries()[0].is_directory);
    assert_eq!(archive.total_size(), 702);

    assert_eq!(archive.read_to_vec(card).await.unwrap(), data);
}

#[tokio::test]
async fn finds_end_record_behind_a_comment() {
    let mut bytes = build_zip(&[Item::Stored("a.txt", b"abc")]);
    let comment = b"archive comment PK\x05\x06 with a fake signature";
    let len = bytes.len();
    bytes[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
    bytes.extend_from_slice(comment);

    let tmp = tempfile::tempdir().unwrap();
    let path = write_archive(tmp.path(), "comment.zip", &bytes);
    let archive = ZipArchive::open(LocalFileReader::new(&path).unwrap())
        .await
        .unwrap();

    assert_eq!(archive.reader().path(), path);
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.read_to_vec(&archive.entries()[0]).await.unwrap(), b"abc");
}

#[tokio::test]
async fn rejects_truncated_central_directory() {
    let bytes = build_zip(&[Item::Stored("a.txt", b"abc"), Item::Stored("b.txt", b"def")]);
    let eocd = bytes.len() - 22;
    // drop the tail of the central directory but keep the end record
    let mut damaged = bytes[..eocd - 10].to_vec();
    damaged.extend_from_slice(&bytes[eocd..]);

    assert!(ZipArchive::open(MemoryReader::new(damaged)).await.is_err());
}

#[tokio::test]
async fn filters_real_file_list() {
    let bytes = build_zip(&[
        Item::Stored("deck/main.ydk", b"#main"),
        Item::Dir("pics/"),
        Item::Stored("pics/field/bg.JPG", b"jpg"),
        Item::Stored("pics/1.png", b"png"),
        Item::Stored("strings.conf", b"conf"),
    ]);
    let archive = ZipArchive::open(MemoryReader::new(bytes)).await.unwrap();

    assert_eq!(find_entries(archive.entries(), &["png", "jpg"], 1), vec![3]);
    assert_eq!(find_entries(archive.entries(), &["jpg"], 2), vec![2]);
    assert_eq!(find_entries(archive.entries(), &[], 0), vec![4]);
}

#[tokio::test]
async fn archive_set_prefers_earlier_archives() {
    let base = build_zip(&[
        Item::Stored("strings.conf", b"base"),
        Item::Stored("only-base.txt", b"1"),
    ]);
    let patch = build_zip(&[Item::Deflated("strings.conf", b"patched strings")]);

    let mut set = ArchiveSet::new();
    set.push(ZipArchive::open(MemoryReader::new(patch)).await.unwrap());
    set.push(ZipArchive::open(MemoryReader::new(base)).await.unwrap());

    assert_eq!(set.read("strings.conf").await.unwrap().unwrap(), b"patched strings");
    assert_eq!(set.read("only-base.txt").await.unwrap().unwrap(), b"1");
    assert!(set.read("missing.txt").await.unwrap().is_none());

    let (archive, entry) = set.find("only-base.txt").unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(entry.uncompressed_size, 1);
}
