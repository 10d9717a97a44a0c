use aggregator_common::fetcher::FetcherOptions;
use csaf_aggregator::config::{ProviderConfig, RunConfig};
use csaf_aggregator::process::{AGGREGATOR_DIR, Processor};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

fn processor(folder: &Path, web: &Path, providers: &[&str]) -> Processor {
    let config = RunConfig {
        workers: 1,
        folder: folder.to_path_buf(),
        web: web.to_path_buf(),
        interim_window_days: None,
        providers: providers
            .iter()
            .map(|name| ProviderConfig {
                name: name.to_string(),
                domain: format!("{name}.example.com"),
            })
            .collect(),
    };
    Processor::new(config, FetcherOptions::new())
}

#[test]
fn orphaned_links_and_owned_mirrors_are_removed() {
    let tmp = tempfile::tempdir().expect("must create");
    let folder = tmp.path().join("folder");
    let web = tmp.path().join("web");
    let published = web.join(AGGREGATOR_DIR);
    fs::create_dir_all(&folder).expect("must create");
    fs::create_dir_all(&published).expect("must create");

    // an orphaned mirror: link plus aggregator-owned directory
    let old_mirror = folder.join("old-57a1");
    fs::create_dir(&old_mirror).expect("must create");
    fs::write(old_mirror.join("index.txt"), "").expect("must write");
    symlink(&old_mirror, published.join("old")).expect("must link");

    // an orphaned link pointing outside the working folder
    let external = tmp.path().join("external");
    fs::create_dir(&external).expect("must create");
    fs::write(external.join("keep.txt"), "precious").expect("must write");
    symlink(&external, published.join("foreign")).expect("must link");

    // a regular directory, not managed by the sweep
    let plain = published.join("plain");
    fs::create_dir(&plain).expect("must create");

    // a still-configured provider
    let kept_mirror = folder.join("kept-33b0");
    fs::create_dir(&kept_mirror).expect("must create");
    symlink(&kept_mirror, published.join("kept")).expect("must link");

    processor(&folder, &web, &["kept"])
        .remove_orphans()
        .expect("sweep must succeed");

    // link and owned mirror directory are gone
    assert!(fs::symlink_metadata(published.join("old")).is_err());
    assert!(!old_mirror.exists());

    // the foreign link is gone, its target untouched
    assert!(fs::symlink_metadata(published.join("foreign")).is_err());
    assert!(external.join("keep.txt").exists());

    // regular entries are never touched
    assert!(plain.is_dir());

    // configured providers stay published
    assert!(fs::symlink_metadata(published.join("kept")).is_ok());
    assert!(kept_mirror.is_dir());
}

#[test]
fn dangling_links_are_left_alone() {
    let tmp = tempfile::tempdir().expect("must create");
    let folder = tmp.path().join("folder");
    let web = tmp.path().join("web");
    let published = web.join(AGGREGATOR_DIR);
    fs::create_dir_all(&folder).expect("must create");
    fs::create_dir_all(&published).expect("must create");

    symlink(folder.join("never-existed"), published.join("dangling")).expect("must link");

    processor(&folder, &web, &[])
        .remove_orphans()
        .expect("sweep must succeed");

    assert!(fs::symlink_metadata(published.join("dangling")).is_ok());
}

#[test]
fn links_to_files_are_not_mirrors() {
    let tmp = tempfile::tempdir().expect("must create");
    let folder = tmp.path().join("folder");
    let web = tmp.path().join("web");
    let published = web.join(AGGREGATOR_DIR);
    fs::create_dir_all(&folder).expect("must create");
    fs::create_dir_all(&published).expect("must create");

    let file = folder.join("not-a-mirror.txt");
    fs::write(&file, "data").expect("must write");
    symlink(&file, published.join("filelink")).expect("must link");

    processor(&folder, &web, &[])
        .remove_orphans()
        .expect("sweep must succeed");

    assert!(fs::symlink_metadata(published.join("filelink")).is_ok());
    assert!(file.exists());
}
