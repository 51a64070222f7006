use anyhow::{anyhow, bail};
use pipekit::Pipe;
use pipekit::engine::scan_lines;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn counter() -> (Arc<Mutex<i64>>, Arc<Mutex<i64>>, Arc<Mutex<i64>>) {
    let n = Arc::new(Mutex::new(0i64));
    (Arc::clone(&n), Arc::clone(&n), n)
}

// --- concurrent stages ---

#[test]
fn test_stream_stages_interleave() {
    // Stage A sleeps, bumps the counter and emits two lines per input line; stage B doubles
    // the counter for every line it sees. Only a concurrent pipeline lets B run between
    // A's lines.
    let (a, b, n) = counter();
    let result = Pipe::slice(vec![""; 5])
        .stream()
        .each_line(move |_, out| {
            thread::sleep(Duration::from_millis(10));
            *a.lock().unwrap() += 1;
            out.push_str("\n\n");
        })
        .each_line(move |_, out| {
            *b.lock().unwrap() *= 2;
            out.push('\n');
        })
        .wait();
    assert!(result.is_ok());

    let mut want = 0i64;
    for _ in 0..5 {
        want = (want + 1) * 4;
    }
    assert_eq!(want, 1364);
    assert_eq!(*n.lock().unwrap(), want);
}

#[test]
fn test_stream_stages_interleave_via_filter() {
    let (a, b, n) = counter();
    let result = Pipe::slice(vec![""; 5])
        .stream()
        .filter(move |r, w| {
            scan_lines(r, |_| {
                thread::sleep(Duration::from_millis(10));
                *a.lock().unwrap() += 1;
                w.write_all(b"\n\n")?;
                Ok(true)
            })
        })
        .filter(move |r, w| {
            scan_lines(r, |_| {
                *b.lock().unwrap() *= 2;
                w.write_all(b"\n")?;
                Ok(true)
            })
        })
        .wait();
    assert!(result.is_ok());
    assert_eq!(*n.lock().unwrap(), 1364);
}

#[cfg(unix)]
#[test]
fn test_stream_from_subprocess() {
    let (b, _, n) = counter();
    let count = Pipe::stream_start()
        .exec("sh -c 'for i in 1 2 3 4 5; do echo 1; done'")
        .each_line(move |line, out| {
            *b.lock().unwrap() += line.parse::<i64>().unwrap_or(0);
            out.push_str(line);
            out.push('\n');
        })
        .count_lines()
        .unwrap();
    assert_eq!(count, 5);
    assert_eq!(*n.lock().unwrap(), 5);
}

#[test]
fn test_stream_matches_batch_output() {
    let input: Vec<String> = (1..=200).map(|i| format!("row {} item{}", i, i % 7)).collect();
    let build = |p: Pipe| {
        p.match_str("item3")
            .replace("row", "line")
            .column(2)
            .first(20)
    };
    let batch = build(Pipe::slice(input.clone())).string().unwrap();
    let streamed = build(Pipe::slice(input).stream()).string().unwrap();
    assert!(!batch.is_empty());
    assert_eq!(streamed, batch);
}

#[test]
fn test_stream_empty_predecessor() {
    let (a, _, n) = counter();
    let result = Pipe::stream_start()
        .each_line(move |_, _| *a.lock().unwrap() += 1)
        .wait();
    assert!(result.is_ok());
    assert_eq!(*n.lock().unwrap(), 0);

    let out = Pipe::slice(Vec::<String>::new())
        .stream()
        .first(1)
        .join()
        .string()
        .unwrap();
    assert_eq!(out, "\n");
}

#[test]
fn test_stream_first_stops_upstream_quietly() {
    let lines: Vec<String> = (0..100_000).map(|i| i.to_string()).collect();
    let p = Pipe::slice(lines)
        .stream()
        .each_line(|line, out| {
            out.push_str(line);
            out.push('\n');
        })
        .first(3);
    let out = p.string();
    assert_eq!(out.unwrap(), "0\n1\n2\n");
}

#[test]
fn test_stream_backpressure_bounds_producer() {
    let produced = Arc::new(AtomicUsize::new(0));
    let max_lead = Arc::new(AtomicUsize::new(0));
    let (p_count, c_produced, c_lead) = (
        Arc::clone(&produced),
        Arc::clone(&produced),
        Arc::clone(&max_lead),
    );
    let mut consumed = 0usize;

    let lines: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    let count = Pipe::slice(lines)
        .with_channel_capacity(1)
        .stream()
        .each_line(move |line, out| {
            p_count.fetch_add(1, Ordering::SeqCst);
            out.push_str(line);
            out.push('\n');
        })
        .each_line(move |line, out| {
            consumed += 1;
            let lead = c_produced.load(Ordering::SeqCst).saturating_sub(consumed);
            c_lead.fetch_max(lead, Ordering::SeqCst);
            thread::sleep(Duration::from_micros(200));
            out.push_str(line);
            out.push('\n');
        })
        .count_lines()
        .unwrap();

    assert_eq!(count, 200);
    assert_eq!(produced.load(Ordering::SeqCst), 200);
    assert!(
        max_lead.load(Ordering::SeqCst) <= 3,
        "producer ran {} lines ahead",
        max_lead.load(Ordering::SeqCst)
    );
}

#[test]
fn test_pending_stages_joined_by_sink() {
    let p = Pipe::echo("a\nb\n")
        .stream()
        .match_str("a")
        .first(5);
    assert_eq!(p.pending_stages(), 2);
    let p = p.synchronize();
    assert_eq!(p.pending_stages(), 0);
    assert_eq!(p.string().unwrap(), "a\n");
}

// --- first error wins ---

#[test]
fn test_first_error_wins() {
    let later_lines = Arc::new(AtomicUsize::new(0));
    let trailer_written = Arc::new(AtomicBool::new(false));
    let (seen, wrote) = (Arc::clone(&later_lines), Arc::clone(&trailer_written));

    let lines: Vec<String> = (1..=100).map(|i| i.to_string()).collect();
    let p = Pipe::slice(lines)
        .stream()
        .each_line(|line, out| {
            out.push_str(line);
            out.push('\n');
        })
        .filter(|r, w| {
            let mut n = 0;
            scan_lines(r, |line| {
                n += 1;
                if n == 3 {
                    bail!("stage two failed");
                }
                writeln!(w, "{line}")?;
                Ok(true)
            })
        })
        .filter(move |r, w| {
            scan_lines(r, |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })?;
            wrote.store(w.write_all(b"trailer\n").is_ok(), Ordering::SeqCst);
            Err(anyhow!("stage three saw its input end early"))
        });

    let err = p.wait().unwrap_err();
    assert_eq!(err.to_string(), "stage two failed");
    assert!(later_lines.load(Ordering::SeqCst) <= 2);
    assert!(!trailer_written.load(Ordering::SeqCst));
}

#[test]
fn test_stage_panic_becomes_error() {
    let err = Pipe::echo("x\n")
        .stream()
        .each_line(|_, _| panic!("stage blew up"))
        .wait()
        .unwrap_err();
    assert!(err.to_string().contains("panicked"));
    assert_eq!(err.exit_status(), 0);
}

#[cfg(unix)]
#[test]
fn test_stream_wait_reports_exit_status() {
    let err = Pipe::stream_start()
        .exec("sh -c 'exit 7'")
        .match_str("anything")
        .wait()
        .unwrap_err();
    assert_eq!(err.exit_status(), 7);
}

// --- synchronize ---

#[test]
fn test_synchronize_collapses_stream() {
    let (a, b, n) = counter();
    let c = Arc::clone(&n);
    let p = Pipe::slice(vec![""; 5])
        .stream()
        .each_line(move |_, out| {
            thread::sleep(Duration::from_millis(10));
            *a.lock().unwrap() += 1;
            out.push('\n');
        })
        .each_line(move |_, out| {
            *b.lock().unwrap() *= 2;
            out.push('\n');
        })
        .synchronize()
        .each_line(move |_, out| {
            *c.lock().unwrap() *= 2;
            out.push('\n');
        });

    // Batch stages after synchronize have already run, no sink needed.
    let mut want = 0i64;
    for _ in 0..5 {
        want = (want + 1) * 2;
    }
    for _ in 0..5 {
        want *= 2;
    }
    assert_eq!(want, 1984);
    assert_eq!(*n.lock().unwrap(), want);
    assert!(!p.is_streaming());
    assert_eq!(p.count_lines().unwrap(), 5);
}

#[test]
fn test_synchronize_non_streaming_is_noop() {
    let count = Arc::new(AtomicUsize::new(0));
    let released = Arc::clone(&count);
    let source = pipekit::Source::with_release(std::io::Cursor::new(b"x\n".to_vec()), move || {
        released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let p = Pipe::new().with_source(source).synchronize();
    assert!(!p.is_streaming());
    // Not drained: the source is still open.
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(p.string().unwrap(), "x\n");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_synchronize_failed_pipe_unchanged() {
    let p = Pipe::stream_start().with_error("already broken");
    let before = p.error().unwrap();
    let p = p.synchronize();
    assert!(p.is_streaming());
    assert_eq!(p.error().unwrap(), before);
}

#[test]
fn test_synchronize_carries_stage_error() {
    let p = Pipe::echo("a\n")
        .stream()
        .filter(|_, _| Err(anyhow!("exit status 4")))
        .synchronize();
    assert_eq!(p.exit_status(), 4);
    assert_eq!(p.string().unwrap_err().exit_status(), 4);
}

#[test]
fn test_stream_again_after_synchronize() {
    let out = Pipe::slice(["b", "a", "b"])
        .stream()
        .match_str("b")
        .synchronize()
        .stream()
        .freq()
        .string()
        .unwrap();
    assert_eq!(out, "2 b\n");
}
