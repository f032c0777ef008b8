//! Admission planning: splitting a `requestThreads` batch into immediately
//! assignable sub-requests, queueable sub-requests, and silent overflow.

use std::net::IpAddr;

use super::request::SubRequest;

// ---------------------------------------------------------------------------
// AdmissionPlan
// ---------------------------------------------------------------------------

/// Outcome of planning one `requestThreads` command.
///
/// `assigned` sub-requests map onto currently free workers and are pushed
/// verbatim. `queued` sub-requests fit (possibly truncated) into the
/// remaining queue capacity. Anything past the first overflow is dropped —
/// never queued, never reported back to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPlan {
    // ---
    pub assigned: Vec<SubRequest>,
    pub queued: Vec<SubRequest>,
}

// ---

impl AdmissionPlan {
    // ---

    /// Ids reported in the `assigned` field of the reply.
    pub fn assigned_ids(&self) -> Vec<usize> {
        self.assigned.iter().map(|s| s.sub_request_id).collect()
    }

    // ---

    /// Ids reported in the `queued` field of the reply. A truncated
    /// sub-request keeps its original id.
    pub fn queued_ids(&self) -> Vec<usize> {
        self.queued.iter().map(|s| s.sub_request_id).collect()
    }

    // ---

    /// Number of ready announcements the control connection must drain for
    /// this plan: one per assigned or queued sub-request.
    pub fn expected_announcements(&self) -> usize {
        self.assigned.len() + self.queued.len()
    }
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

/// Plan one `requestThreads` command.
///
/// - Sub-requests `0..min(len, free_workers)` are assigned verbatim.
/// - The remainder is walked in order against `space_remaining` (measured
///   in videos). A sub-request that only partially fits is truncated to
///   exactly the leftover space and queued under its original id — unless
///   the leftover is zero, in which case it is dropped. Everything after
///   the first overflow is dropped.
///
/// A `video_count` of zero is not special-cased: it occupies no space and
/// yields a zero-length data-plane session.
pub fn plan(
    producer_ip: IpAddr,
    video_counts: &[u64],
    free_workers: usize,
    space_remaining: u64,
) -> AdmissionPlan {
    // ---
    let assigned_count = video_counts.len().min(free_workers);

    let assigned: Vec<SubRequest> = video_counts[..assigned_count]
        .iter()
        .enumerate()
        .map(|(id, &video_count)| SubRequest {
            producer_ip,
            sub_request_id: id,
            video_count,
        })
        .collect();

    let mut queued = Vec::new();
    let mut occupied: u64 = 0;

    for (id, &video_count) in video_counts.iter().enumerate().skip(assigned_count) {
        // occupied <= space_remaining, so leftover cannot underflow. Compared
        // this way round, a wire-supplied count near u64::MAX cannot overflow
        // the capacity check either.
        let leftover = space_remaining - occupied;
        if video_count > leftover {
            // Partial fit: queue whatever still fits under the original id,
            // then stop. The rest of the command is silently dropped.
            if leftover != 0 {
                queued.push(SubRequest {
                    producer_ip,
                    sub_request_id: id,
                    video_count: leftover,
                });
            }
            break;
        }

        occupied += video_count;
        queued.push(SubRequest {
            producer_ip,
            sub_request_id: id,
            video_count,
        });
    }

    AdmissionPlan { assigned, queued }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
