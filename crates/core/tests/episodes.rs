//! Episode listing integration tests.

use tempfile::TempDir;

use subgrab_core::{
    episodes::{filter_and_sort_episode_files, list_episode_files, write_episode_list},
    CompiledPatterns,
};

#[test]
fn test_only_conforming_names_sorted_by_episode() {
    let pattern = CompiledPatterns::default().episode;
    let names = ["第0012话 生日.mp4", "random clip.mp4", "第0003话 开始.mp4"];

    let sorted = filter_and_sort_episode_files(&pattern, names);

    assert_eq!(sorted, vec!["第0003话 开始.mp4", "第0012话 生日.mp4"]);
}

#[test]
fn test_list_then_write() {
    let pattern = CompiledPatterns::default().episode;
    let dir = TempDir::new().unwrap();
    for name in ["第0002话 b.mp4", "第0001话 a.mp4", "cover.jpg"] {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }

    let names = list_episode_files(&pattern, dir.path()).unwrap();
    let list = dir.path().join("episode_list.txt");
    write_episode_list(&list, &names).unwrap();

    assert_eq!(
        std::fs::read_to_string(&list).unwrap(),
        "第0001话 a.mp4\n第0002话 b.mp4\n"
    );
}
