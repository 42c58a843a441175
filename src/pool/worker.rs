//! Stage worker loops.
//!
//! Each worker blocks on its stage's input queue and exits when the queue
//! closes. Failures are pushed onto the error queue rather than raised, so
//! one bad record never takes a stage down.

use crossbeam_channel::{Receiver as QueueReceiver, Sender as QueueSender};

use crate::errors::RecordError;
use crate::parser::RawRecord;

use super::{ErrorFn, ListenerFn, Receiver, ReceiverFn};

pub(crate) fn task_worker(
    tasks: QueueReceiver<RawRecord>,
    send: QueueSender<Receiver>,
    errors: QueueSender<RecordError>,
    receiver_fn: ReceiverFn,
) {
    for record in tasks {
        match receiver_fn(record) {
            Ok(receiver) => {
                if send.send(receiver).is_err() {
                    break;
                }
            }
            Err(err) => {
                if errors.send(err).is_err() {
                    break;
                }
            }
        }
    }
}

pub(crate) fn send_worker(
    send: QueueReceiver<Receiver>,
    errors: QueueSender<RecordError>,
    listener_fn: ListenerFn,
) {
    for receiver in send {
        if let Err(err) = listener_fn(receiver) {
            if errors.send(err).is_err() {
                break;
            }
        }
    }
}

pub(crate) fn error_worker(errors: QueueReceiver<RecordError>, error_fn: ErrorFn) {
    for err in errors {
        error_fn(err);
    }
}
