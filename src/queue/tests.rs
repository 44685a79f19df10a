use super::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

fn t(name: &str) -> Track {
    Track {
        path: PathBuf::from(format!("/music/{name}.mp3")),
        title: name.into(),
        artist: None,
        album: None,
        duration: Duration::from_secs(60),
        genre: None,
        added_at: chrono::DateTime::<chrono::Utc>::from(SystemTime::UNIX_EPOCH),
        display: name.into(),
    }
}

fn titles(q: &Queue) -> Vec<&str> {
    q.entries().iter().map(|t| t.title.as_str()).collect()
}

fn queue_of(names: &[&str]) -> Queue {
    let mut q = Queue::new();
    q.enqueue_all(names.iter().map(|n| t(n)));
    q
}

#[test]
fn enqueue_then_remove_restores_sequence() {
    let mut q = queue_of(&["a", "b"]);
    let before = titles(&q).iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let idx = q.enqueue(t("c"));
    assert_eq!(idx, 2);
    let removed = q.remove(idx).unwrap();
    assert_eq!(removed.title, "c");
    assert_eq!(titles(&q), before);
}

#[test]
fn index_operations_reject_out_of_range() {
    let mut q = queue_of(&["a"]);
    assert!(matches!(q.remove(1), Err(Error::OutOfRange { index: 1, len: 1 })));
    assert!(matches!(q.reorder(0, 3), Err(Error::OutOfRange { index: 3, .. })));
    assert!(matches!(q.set_cursor(5), Err(Error::OutOfRange { .. })));

    let mut empty = Queue::new();
    assert!(matches!(empty.set_cursor(0), Err(Error::OutOfRange { index: 0, len: 0 })));
    assert_eq!(empty.cursor(), None);
}

#[test]
fn advance_without_loop_unsets_exactly_once_and_never_revisits() {
    let mut q = queue_of(&["a", "b", "c", "d"]);
    q.set_cursor(0).unwrap();

    let mut visited = vec![0];
    let mut unset_count = 0;
    for _ in 0..q.len() {
        match q.advance() {
            Some(i) => {
                assert!(!visited.contains(&i));
                visited.push(i);
            }
            None => unset_count += 1,
        }
    }
    assert_eq!(unset_count, 1);
    assert_eq!(q.cursor(), None);
}

#[test]
fn advance_honours_loop_modes() {
    let mut q = queue_of(&["a", "b"]);
    q.set_cursor(1).unwrap();

    q.set_loop_mode(LoopMode::LoopOne);
    assert_eq!(q.advance(), Some(1));

    q.set_loop_mode(LoopMode::LoopAll);
    assert_eq!(q.advance(), Some(0));

    q.set_loop_mode(LoopMode::NoLoop);
    assert_eq!(q.advance(), Some(1));
    assert_eq!(q.advance(), None);
    // Unset cursor stays unset.
    assert_eq!(q.advance(), None);
}

#[test]
fn manual_next_and_previous_stop_at_edges_unless_looping() {
    let mut q = queue_of(&["a", "b"]);
    assert_eq!(q.next(), Some(0));
    assert_eq!(q.next(), Some(1));
    assert_eq!(q.next(), None);
    assert_eq!(q.cursor(), Some(1));

    q.set_loop_mode(LoopMode::LoopAll);
    assert_eq!(q.next(), Some(0));
    assert_eq!(q.previous(), Some(1));

    q.set_loop_mode(LoopMode::LoopOne);
    assert_eq!(q.next(), None);
    assert_eq!(q.previous(), Some(0));
    assert_eq!(q.previous(), None);
    assert_eq!(q.cursor(), Some(0));
}

#[test]
fn remove_adjusts_cursor() {
    let mut q = queue_of(&["a", "b", "c"]);
    q.set_cursor(2).unwrap();
    q.remove(0).unwrap();
    assert_eq!(q.cursor(), Some(1));
    assert_eq!(q.current().unwrap().title, "c");

    q.remove(1).unwrap();
    assert_eq!(q.cursor(), None);

    q.set_cursor(0).unwrap();
    q.remove(0).unwrap();
    assert!(q.is_empty());
    assert_eq!(q.cursor(), None);
}

#[test]
fn reorder_is_a_splice_and_cursor_follows_its_track() {
    let mut q = queue_of(&["a", "b", "c", "d"]);
    q.set_cursor(1).unwrap();

    q.reorder(0, 3).unwrap();
    assert_eq!(titles(&q), vec!["b", "c", "d", "a"]);
    assert_eq!(q.current().unwrap().title, "b");

    q.reorder(0, 2).unwrap();
    assert_eq!(titles(&q), vec!["c", "d", "b", "a"]);
    assert_eq!(q.current().unwrap().title, "b");

    q.reorder(3, 0).unwrap();
    assert_eq!(titles(&q), vec!["a", "c", "d", "b"]);
    assert_eq!(q.current().unwrap().title, "b");
}

#[test]
fn shuffle_keeps_members_and_puts_current_first() {
    let mut q = queue_of(&["a", "b", "c", "d", "e"]);
    q.set_cursor(3).unwrap();
    q.shuffle(&mut StdRng::seed_from_u64(7));

    assert_eq!(q.cursor(), Some(0));
    assert_eq!(q.current().unwrap().title, "d");
    let mut sorted = titles(&q);
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn clear_empties_and_unsets() {
    let mut q = queue_of(&["a"]);
    q.set_cursor(0).unwrap();
    q.clear();
    assert!(q.is_empty());
    assert_eq!(q.current(), None);
}

#[test]
fn refresh_drops_vanished_entries_and_cursor_follows_its_track() {
    let mut q = queue_of(&["a", "b", "c"]);
    q.set_cursor(2).unwrap();

    let (dropped, current_dropped) = q.refresh(|t| {
        (t.title != "a").then(|| Track {
            title: t.title.to_uppercase(),
            ..t.clone()
        })
    });

    assert_eq!((dropped, current_dropped), (1, false));
    assert_eq!(titles(&q), vec!["B", "C"]);
    assert_eq!(q.cursor(), Some(1));
    assert_eq!(q.current().unwrap().title, "C");
}

#[test]
fn refresh_unsets_cursor_when_current_vanishes() {
    let mut q = queue_of(&["a", "b"]);
    q.set_cursor(0).unwrap();

    let (dropped, current_dropped) = q.refresh(|t| (t.title != "a").then(|| t.clone()));

    assert_eq!((dropped, current_dropped), (1, true));
    assert_eq!(titles(&q), vec!["b"]);
    assert_eq!(q.cursor(), None);
}
