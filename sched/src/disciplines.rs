use crate::*;

/// Runs tasks to completion in order of arrival. Equal arrivals keep
/// their input order.
pub fn fcfs(tasks: &[Task]) -> Vec<TaskResult> {
    let mut clock = 0;

    tasks.iter()
        .sorted_by_key(|t| t.arrival_time)
        .map(|t| {
            let start = clock.max(t.arrival_time);
            clock = start + t.burst_time;
            TaskResult::new(t, start, clock)
        })
        .collect()
}

/// Shortest burst among arrived tasks goes next, and keeps the CPU
/// until done.
pub fn sjf(tasks: &[Task]) -> Vec<TaskResult> {
    non_preemptive(tasks, |t| t.burst_time)
}

/// Lowest priority value among arrived tasks goes next, and keeps the
/// CPU until done. Fails if any task lacks a priority.
pub fn priority(tasks: &[Task]) -> Result<Vec<TaskResult>, SchedError> {
    if let Some(t) = tasks.iter().find(|t| t.priority.is_none()) {
        return Err(SchedError::MissingPriority { id: t.id.clone() });
    }

    Ok(non_preemptive(tasks, |t| t.priority.unwrap_or(u32::MAX)))
}

/// Shortest remaining time among arrived tasks runs for one tick, then
/// the choice is made again. Results are ordered by first tick on the CPU.
pub fn srtn(tasks: &[Task]) -> Vec<TaskResult> {
    let mut remaining: Vec<ByteSteps> = tasks.iter().map(|t| t.burst_time).collect();
    let mut started: Vec<Option<ByteSteps>> = vec![None; tasks.len()];
    let mut res = Vec::with_capacity(tasks.len());
    let mut clock = 0;
    while res.len() < tasks.len() {
        let Some(idx) = (0..tasks.len())
            .filter(|&i| remaining[i] > 0 && tasks[i].arrival_time <= clock)
            .min_by_key(|&i| remaining[i]) else {
            clock = next_arrival(tasks, |i| remaining[i] > 0, clock);
            continue;
        };
        let start = *started[idx].get_or_insert(clock);
        remaining[idx] -= 1;
        clock += 1;
        if remaining[idx] == 0 {
            res.push(TaskResult::new(&tasks[idx], start, clock));
        }
    }
    res.sort_by_key(|r| r.start_time);

    res
}

// Picks the arrived, unfinished task with the smallest key (first in input
// order on ties) and runs it to completion.
fn non_preemptive<K, F>(tasks: &[Task], key: F) -> Vec<TaskResult>
where K: Ord, F: Fn(&Task) -> K {
    let mut done = vec![false; tasks.len()];
    let mut res = Vec::with_capacity(tasks.len());
    let mut clock = 0;
    while res.len() < tasks.len() {
        let Some(idx) = (0..tasks.len())
            .filter(|&i| !done[i] && tasks[i].arrival_time <= clock)
            .min_by_key(|&i| key(&tasks[i])) else {
            clock = next_arrival(tasks, |i| !done[i], clock);
            continue;
        };
        let t = &tasks[idx];
        res.push(TaskResult::new(t, clock, clock + t.burst_time));
        clock += t.burst_time;
        done[idx] = true;
    }

    res
}

// Idle CPU: skip straight to the earliest arrival among pending tasks.
fn next_arrival<P: Fn(usize) -> bool>(tasks: &[Task], pending: P, clock: ByteSteps) -> ByteSteps {
    (0..tasks.len())
        .filter(|&i| pending(i))
        .map(|i| tasks[i].arrival_time)
        .min()
        .map_or(clock + 1, |a| a.max(clock + 1))
}
