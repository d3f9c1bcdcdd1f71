// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests: every `Request`/`Response` must survive an
//! encode/decode round trip through the same JSON path the socket uses.

use crate::{decode, encode, Request, Response};
use proptest::prelude::*;
use vf_core::{JobRequest, Priority, Quality};

fn arb_quality() -> impl Strategy<Value = Quality> {
    prop_oneof![Just(Quality::Low), Just(Quality::Medium), Just(Quality::High), Just(Quality::Ultra)]
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Urgent), Just(Priority::High), Just(Priority::Normal), Just(Priority::Low)]
}

fn arb_job_request() -> impl Strategy<Value = JobRequest> {
    ("[a-zA-Z ]{1,40}", 10u32..=600, "[a-zA-Z]{1,20}", "[a-zA-Z]{1,20}", arb_quality()).prop_map(
        |(prompt, duration_seconds, style, voice, quality)| JobRequest {
            prompt,
            duration_seconds,
            style,
            voice,
            quality,
        },
    )
}

fn arb_request() -> impl Strategy<Value = Request> {
    prop_oneof![
        (arb_job_request(), proptest::option::of("[a-z]{1,10}"), proptest::option::of(arb_priority())).prop_map(
            |(request, user, priority)| Request::Submit { request, user, priority }
        ),
        "[a-z0-9-]{1,20}".prop_map(|request_id| Request::Status { request_id }),
        "[a-z0-9-]{1,20}".prop_map(|request_id| Request::Cancel { request_id }),
        Just(Request::Metrics),
        Just(Request::ResourceUsage),
        proptest::option::of("[a-z]{1,10}").prop_map(|service| Request::RateLimitStatus { service }),
        Just(Request::Health),
        Just(Request::Start),
        Just(Request::Pause),
        Just(Request::Resume),
        proptest::option::of(0u64..=600).prop_map(|timeout_seconds| Request::Stop { timeout_seconds }),
        Just(Request::Sweep),
    ]
}

fn arb_response() -> impl Strategy<Value = Response> {
    prop_oneof![
        "[a-z0-9-]{1,20}".prop_map(|request_id| Response::Submitted { request_id }),
        Just(Response::Cancelled),
        Just(Response::NotFound),
        ("[a-z_]{1,20}", "[a-zA-Z ]{1,40}").prop_map(|(kind, message)| Response::Error { kind, message }),
        any::<bool>().prop_map(|ok| Response::Started { ok }),
        Just(Response::Paused),
        Just(Response::Resumed),
        any::<bool>().prop_map(|graceful| Response::Stopped { graceful }),
    ]
}

proptest! {
    #[test]
    fn request_round_trips_through_json(req in arb_request()) {
        let bytes = encode(&req).unwrap();
        let back: Request = decode(&bytes).unwrap();
        prop_assert_eq!(format!("{req:?}"), format!("{back:?}"));
    }

    #[test]
    fn response_round_trips_through_json(resp in arb_response()) {
        let bytes = encode(&resp).unwrap();
        let back: Response = decode(&bytes).unwrap();
        prop_assert_eq!(format!("{resp:?}"), format!("{back:?}"));
    }
}
