// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Advertisement filtering for scan streams.

use futures::{ready, Stream};
use pin_project_lite::pin_project;
use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};
use uuid::Uuid;

use super::types::Peripheral;
use crate::error::TransportResult;

pin_project! {
    /// Yields each named peripheral once, on its first sighting.
    ///
    /// Relays advertise repeatedly while a scan runs; unnamed advertisers
    /// are not relay devices and are skipped. Errors pass through.
    pub struct NamedPeripherals<S> {
        #[pin]
        inner: S,
        seen: HashSet<Uuid>,
    }
}

impl<S> NamedPeripherals<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }
}

impl<S> Stream for NamedPeripherals<S>
where
    S: Stream<Item = TransportResult<Peripheral>>,
{
    type Item = TransportResult<Peripheral>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(peripheral)) => {
                    if peripheral.name.is_none() {
                        continue;
                    }
                    if this.seen.insert(peripheral.id) {
                        return Poll::Ready(Some(Ok(peripheral)));
                    }
                }
                other => return Poll::Ready(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use futures::{stream, StreamExt};

    fn peripheral(n: u128, name: Option<&str>) -> Peripheral {
        Peripheral {
            id: Uuid::from_u128(n),
            name: name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_dedup_and_name_filter() {
        let sightings = vec![
            Ok(peripheral(1, Some("Relay A"))),
            Ok(peripheral(2, None)),
            Ok(peripheral(1, Some("Relay A"))),
            Ok(peripheral(3, Some("Relay B"))),
            Ok(peripheral(3, Some("Relay B"))),
        ];

        let found: Vec<_> = NamedPeripherals::new(stream::iter(sightings))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|r| r.unwrap().id)
            .collect();

        assert_eq!(found, vec![Uuid::from_u128(1), Uuid::from_u128(3)]);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let sightings = vec![
            Ok(peripheral(1, Some("Relay A"))),
            Err(TransportError::Bluetooth("adapter off".to_string())),
        ];

        let items: Vec<_> = NamedPeripherals::new(stream::iter(sightings)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
