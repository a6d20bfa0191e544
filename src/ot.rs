//! Random Chou–Orlandi base OT over P-256.
//!
//! The sender ends up with `count` key pairs `(k0, k1)`, the receiver with
//! `k_c` for each choice bit `c`. Keys are derived from shared curve points
//! with [`DigestAccumulator::kdf`], so no ciphertexts cross the wire.

use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::Field;
use p256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};

use crate::comm_channel::ByteChannel;
use crate::engine::EngineError;
use crate::hash::{Block, DigestAccumulator};

/// Length of a compressed SEC1 point.
const POINT_SIZE: usize = 33;

fn encode(point: &ProjectivePoint) -> Result<[u8; POINT_SIZE], EngineError> {
    let encoded = point.to_affine().to_encoded_point(true);
    encoded
        .as_bytes()
        .try_into()
        .map_err(|_| EngineError::InvalidPoint)
}

fn decode(bytes: &[u8]) -> Result<ProjectivePoint, EngineError> {
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|_| EngineError::InvalidPoint)?;
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine
        .map(ProjectivePoint::from)
        .ok_or(EngineError::InvalidPoint)
}

fn kdf(point: &ProjectivePoint, id: usize) -> Result<Block, EngineError> {
    Ok(DigestAccumulator::kdf(&encode(point)?, id as u64))
}

pub struct OTCO;

impl OTCO {
    /// Sender side: returns one `(k0, k1)` pair per OT.
    pub fn send<IO: ByteChannel>(io: &mut IO, count: usize) -> Result<Vec<(Block, Block)>, EngineError> {
        let mut rng = rand::thread_rng();
        let a = Scalar::random(&mut rng);
        let big_a = ProjectivePoint::GENERATOR * a;

        io.send(&encode(&big_a)?)?;
        io.flush()?;

        let a_a = big_a * a;
        let points = io.recv(count * POINT_SIZE)?;
        points
            .chunks_exact(POINT_SIZE)
            .enumerate()
            .map(|(i, bytes)| {
                let b_a = decode(bytes)? * a;
                Ok((kdf(&b_a, i)?, kdf(&(b_a - a_a), i)?))
            })
            .collect()
    }

    /// Receiver side: returns `k_{choices[i]}` for each OT.
    pub fn recv<IO: ByteChannel>(io: &mut IO, choices: &[bool]) -> Result<Vec<Block>, EngineError> {
        let mut rng = rand::thread_rng();
        let b: Vec<Scalar> = choices.iter().map(|_| Scalar::random(&mut rng)).collect();

        let big_a = decode(&io.recv(POINT_SIZE)?)?;

        let mut points = Vec::with_capacity(choices.len() * POINT_SIZE);
        for (b_i, &choice) in b.iter().zip(choices) {
            let mut big_b = ProjectivePoint::GENERATOR * b_i;
            if choice {
                big_b += big_a;
            }
            points.extend_from_slice(&encode(&big_b)?);
        }
        io.send(&points)?;
        io.flush()?;

        b.iter()
            .enumerate()
            .map(|(i, b_i)| kdf(&(big_a * b_i), i))
            .collect()
    }
}
