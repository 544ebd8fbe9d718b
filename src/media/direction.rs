use bitflags::bitflags;

bitflags! {
    /// Direction of a media lane, mirroring [RTCRtpTransceiverDirection][1].
    ///
    /// [`sendrecv` direction][2] can be represented by
    /// [`LaneDirection::all`] bitflag.
    ///
    /// [1]: https://w3.org/TR/webrtc/#dom-rtcrtptransceiverdirection
    /// [2]: https://w3.org/TR/webrtc/#dom-rtcrtptransceiverdirection-sendrecv
    pub struct LaneDirection: u8 {
        /// Lane neither sends nor receives media.
        ///
        /// Lane with such direction is never offered, while a negotiated
        /// lane may still become `inactive`.
        const NONE = 0b00;

        /// Lane sends media to the remote side.
        const SEND = 0b01;

        /// Lane receives media from the remote side.
        const RECV = 0b10;
    }
}

impl LaneDirection {
    /// Returns this [`LaneDirection`] as seen by the remote side.
    #[must_use]
    pub fn reversed(self) -> Self {
        let mut reversed = Self::NONE;
        if self.contains(Self::SEND) {
            reversed |= Self::RECV;
        }
        if self.contains(Self::RECV) {
            reversed |= Self::SEND;
        }
        reversed
    }

    /// Returns SDP attribute name (`a=sendrecv` and friends) describing this
    /// [`LaneDirection`].
    pub fn as_sdp_attribute(self) -> &'static str {
        if self.is_all() {
            "sendrecv"
        } else if self.contains(Self::SEND) {
            "sendonly"
        } else if self.contains(Self::RECV) {
            "recvonly"
        } else {
            "inactive"
        }
    }

    /// Parses [`LaneDirection`] from SDP direction attribute name.
    pub fn from_sdp_attribute(name: &str) -> Option<Self> {
        Some(match name {
            "sendrecv" => Self::all(),
            "sendonly" => Self::SEND,
            "recvonly" => Self::RECV,
            "inactive" => Self::NONE,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::LaneDirection;

    #[test]
    fn enable_works_correctly() {
        use LaneDirection as D;

        for (init, enable_dir, result) in &[
            (D::NONE, D::SEND, D::SEND),
            (D::NONE, D::RECV, D::RECV),
            (D::SEND, D::RECV, D::all()),
            (D::RECV, D::SEND, D::all()),
        ] {
            assert_eq!(*init | *enable_dir, *result);
        }
    }

    #[test]
    fn disable_works_correctly() {
        use LaneDirection as D;

        for (init, disable_dir, result) in &[
            (D::SEND, D::SEND, D::NONE),
            (D::RECV, D::RECV, D::NONE),
            (D::all(), D::SEND, D::RECV),
            (D::all(), D::RECV, D::SEND),
        ] {
            assert_eq!(*init - *disable_dir, *result);
        }
    }

    #[test]
    fn reverses_to_remote_view() {
        use LaneDirection as D;

        for (local, remote) in &[
            (D::SEND, D::RECV),
            (D::RECV, D::SEND),
            (D::all(), D::all()),
            (D::NONE, D::NONE),
        ] {
            assert_eq!(local.reversed(), *remote);
        }
    }

    #[test]
    fn sdp_attribute_names() {
        use LaneDirection as D;

        for (dir, attr) in &[
            (D::SEND, "sendonly"),
            (D::RECV, "recvonly"),
            (D::all(), "sendrecv"),
            (D::NONE, "inactive"),
        ] {
            assert_eq!(dir.as_sdp_attribute(), *attr);
            assert_eq!(D::from_sdp_attribute(attr), Some(*dir));
        }
        assert_eq!(D::from_sdp_attribute("rtcp-mux"), None);
    }
}
