// Lumen
// Copyright (c) 2019 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;
use std::io;

use crate::util::bits::*;

fn end_of_bitstream_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::Other, "unexpected end of bitstream"))
}

fn exp_golomb_overflow_error<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::InvalidData, "exp-golomb code exceeds 32 bits"))
}

mod private {
    use std::io;

    pub trait FetchBitsLtr {
        /// Discard any remaining bits in the source and fetch new bits.
        fn fetch_bits(&mut self) -> io::Result<()>;

        /// Get all the bits in the source.
        fn get_bits(&self) -> u64;

        /// Get the number of bits left in the source.
        fn num_bits_left(&self) -> u32;

        /// Consume `num` bits from the source.
        fn consume_bits(&mut self, num: u32);
    }
}

/// A `FiniteBitStream` is a bit stream that has a known length in bits.
pub trait FiniteBitStream {
    /// Gets the number of bits left unread.
    fn bits_left(&self) -> u64;
}

/// `ReadBitsLtr` reads bits from most-significant to least-significant.
pub trait ReadBitsLtr: private::FetchBitsLtr {
    /// Discards any saved bits and resets the `BitStream` to prepare it for a byte-aligned read.
    #[inline(always)]
    fn realign(&mut self) {
        let skip = self.num_bits_left() & 0x7;
        self.consume_bits(skip);
    }

    /// Ignores the specified number of bits from the stream or returns an error.
    #[inline(always)]
    fn ignore_bits(&mut self, mut num_bits: u32) -> io::Result<()> {
        if num_bits <= self.num_bits_left() {
            self.consume_bits(num_bits);
        }
        else {
            // Consume whole bit caches directly.
            while num_bits > self.num_bits_left() {
                num_bits -= self.num_bits_left();
                self.fetch_bits()?;
            }

            if num_bits > 0 {
                // Shift out in two parts to prevent panicing when num_bits == 64.
                self.consume_bits(num_bits - 1);
                self.consume_bits(1);
            }
        }

        Ok(())
    }

    /// Read a single bit as a boolean value or returns an error.
    #[inline(always)]
    fn read_bit(&mut self) -> io::Result<bool> {
        if self.num_bits_left() < 1 {
            self.fetch_bits()?;
        }

        let bit = self.get_bits() & (1 << 63) != 0;

        self.consume_bits(1);
        Ok(bit)
    }

    /// Reads up to 32-bits as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq32(&mut self, mut bit_width: u32) -> io::Result<u32> {
        debug_assert!(bit_width <= u32::BITS);

        // Shift in two 32-bit operations instead of a single 64-bit operation to avoid panicing
        // when bit_width == 0 (and thus shifting right 64-bits).
        let mut bits = (self.get_bits() >> u32::BITS) >> (u32::BITS - bit_width);

        while bit_width > self.num_bits_left() {
            bit_width -= self.num_bits_left();

            self.fetch_bits()?;

            // Unlike the first shift, bit_width is always > 0 here so this operation will never
            // shift by > 63 bits.
            bits |= self.get_bits() >> (u64::BITS - bit_width);
        }

        self.consume_bits(bit_width);

        Ok(bits as u32)
    }

    /// Reads up to 32-bits and interprets them as a signed two's complement integer or returns an
    /// error.
    #[inline(always)]
    fn read_bits_leq32_signed(&mut self, bit_width: u32) -> io::Result<i32> {
        let value = self.read_bits_leq32(bit_width)?;
        Ok(sign_extend_leq32_to_i32(value, bit_width))
    }

    /// Reads up to 64-bits as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq64(&mut self, mut bit_width: u32) -> io::Result<u64> {
        debug_assert!(bit_width <= u64::BITS);

        // Hard-code the bit_width == 0 case as it's not possible to handle both the bit_width == 0
        // and bit_width == 64 cases branchlessly.
        if bit_width == 0 {
            Ok(0)
        }
        else {
            // Since bit_width is always > 0, this shift operation is always < 64, and will
            // therefore never panic.
            let mut bits = self.get_bits() >> (u64::BITS - bit_width);

            while bit_width > self.num_bits_left() {
                bit_width -= self.num_bits_left();

                self.fetch_bits()?;

                bits |= self.get_bits() >> (u64::BITS - bit_width);
            }

            // Shift in two parts to prevent panicing when bit_width == 64.
            self.consume_bits(bit_width - 1);
            self.consume_bits(1);

            Ok(bits)
        }
    }

    /// Reads up to 64-bits and interprets them as a signed two's complement integer or returns an
    /// error.
    #[inline(always)]
    fn read_bits_leq64_signed(&mut self, bit_width: u32) -> io::Result<i64> {
        let value = self.read_bits_leq64(bit_width)?;
        Ok(sign_extend_leq64_to_i64(value, bit_width))
    }

    /// Reads and returns a unary zeros encoded integer or an error.
    #[inline(always)]
    fn read_unary_zeros(&mut self) -> io::Result<u32> {
        let mut num = 0;

        loop {
            let n_zeros = self.get_bits().leading_zeros();

            if n_zeros >= self.num_bits_left() {
                // If the number of zeros exceeds the number of bits left then all the remaining
                // bits were 0.
                num += self.num_bits_left();
                self.fetch_bits()?;
            }
            else {
                // Otherwise, a 1 bit was encountered after `n_zeros` 0 bits.
                num += n_zeros;

                // Since bits are shifted off the cache after they're consumed, for there to be a
                // 1 bit there must be atleast one extra available bit in the cache that can be
                // consumed after the 0 bits.
                self.consume_bits(n_zeros);
                self.consume_bits(1);

                break;
            }
        }

        Ok(num)
    }

    /// Reads an unsigned Exp-Golomb code, `ue(v)`, of up to 32 bits or returns an error.
    #[inline(always)]
    fn read_exp_golomb_unsigned(&mut self) -> io::Result<u32> {
        let n_zeros = self.read_unary_zeros()?;

        if n_zeros > 31 {
            return exp_golomb_overflow_error();
        }

        let suffix = self.read_bits_leq32(n_zeros)?;

        // For n_zeros <= 31, (2^n_zeros - 1) + suffix is at most 2^32 - 2.
        Ok(((1u32 << n_zeros) - 1) + suffix)
    }

    /// Reads a signed Exp-Golomb code, `se(v)`, or returns an error.
    #[inline(always)]
    fn read_exp_golomb_signed(&mut self) -> io::Result<i32> {
        let code = self.read_exp_golomb_unsigned()?;

        // Odd codes map to positive values, even codes to negative values.
        let magnitude = ((code >> 1) + (code & 1)) as i32;

        Ok(if code & 1 == 1 { magnitude } else { -magnitude })
    }
}

/// `BitReaderLtr` reads bits from most-significant to least-significant from any `&[u8]`.
///
/// Stated another way, if N-bits are read from a `BitReaderLtr` then bit 0, the first bit read,
/// is the most-significant bit, and bit N-1, the last bit read, is the least-significant.
pub struct BitReaderLtr<'a> {
    buf: &'a [u8],
    bits: u64,
    n_bits_left: u32,
}

impl<'a> BitReaderLtr<'a> {
    /// Instantiate a new `BitReaderLtr` with the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReaderLtr { buf, bits: 0, n_bits_left: 0 }
    }
}

impl private::FetchBitsLtr for BitReaderLtr<'_> {
    fn fetch_bits(&mut self) -> io::Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let read_len = min(self.buf.len(), std::mem::size_of::<u64>());

        if read_len == 0 {
            return end_of_bitstream_error();
        }

        buf[..read_len].copy_from_slice(&self.buf[..read_len]);

        self.buf = &self.buf[read_len..];

        self.bits = u64::from_be_bytes(buf);
        self.n_bits_left = (read_len as u32) << 3;

        Ok(())
    }

    #[inline(always)]
    fn get_bits(&self) -> u64 {
        self.bits
    }

    #[inline(always)]
    fn num_bits_left(&self) -> u32 {
        self.n_bits_left
    }

    #[inline(always)]
    fn consume_bits(&mut self, num: u32) {
        self.n_bits_left -= num;
        self.bits <<= num;
    }
}

impl ReadBitsLtr for BitReaderLtr<'_> {}

impl FiniteBitStream for BitReaderLtr<'_> {
    fn bits_left(&self) -> u64 {
        (8 * self.buf.len() as u64) + u64::from(self.n_bits_left)
    }
}

/// `BitWriterLtr` writes bits from most-significant to least-significant into an owned buffer.
///
/// It is the inverse of [`BitReaderLtr`]: a sequence of values written with a given set of widths
/// reads back identically with the same widths.
#[derive(Default)]
pub struct BitWriterLtr {
    buf: Vec<u8>,
    /// Partially filled byte. Only the lower `n_acc` bits are valid.
    acc: u32,
    n_acc: u32,
}

impl BitWriterLtr {
    /// Instantiate a new, empty, `BitWriterLtr`.
    pub fn new() -> Self {
        Default::default()
    }

    /// Instantiate a new `BitWriterLtr` that will write `capacity` bytes without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        BitWriterLtr { buf: Vec::with_capacity(capacity), acc: 0, n_acc: 0 }
    }

    /// Instantiate a new, empty, `BitWriterLtr` that reuses the allocation of `buf`.
    pub fn from_vec(mut buf: Vec<u8>) -> Self {
        buf.clear();
        BitWriterLtr { buf, acc: 0, n_acc: 0 }
    }

    /// Gets the total number of bits written.
    pub fn bits_written(&self) -> u64 {
        8 * self.buf.len() as u64 + u64::from(self.n_acc)
    }

    /// Returns true if the next bit written will start a new byte.
    pub fn is_aligned(&self) -> bool {
        self.n_acc == 0
    }

    /// Gets the completely written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Writes a single bit.
    #[inline(always)]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits_leq32(u32::from(bit), 1);
    }

    /// Writes the lower `bit_width` bits of `value`, where `bit_width` is up to 32.
    #[inline(always)]
    pub fn write_bits_leq32(&mut self, value: u32, bit_width: u32) {
        debug_assert!(bit_width <= u32::BITS);
        self.write_bits_leq64(u64::from(value), bit_width);
    }

    /// Writes the lower `bit_width` bits of `value` as a two's complement integer.
    #[inline(always)]
    pub fn write_bits_leq32_signed(&mut self, value: i32, bit_width: u32) {
        self.write_bits_leq32(value as u32, bit_width);
    }

    /// Writes the lower `bit_width` bits of `value`, where `bit_width` is up to 64.
    pub fn write_bits_leq64(&mut self, value: u64, mut bit_width: u32) {
        debug_assert!(bit_width <= u64::BITS);

        while bit_width > 0 {
            let take = min(8 - self.n_acc, bit_width);
            let chunk = (value >> (bit_width - take)) & mask_lower_u64(take);

            self.acc = (self.acc << take) | chunk as u32;
            self.n_acc += take;
            bit_width -= take;

            if self.n_acc == 8 {
                self.buf.push(self.acc as u8);
                self.acc = 0;
                self.n_acc = 0;
            }
        }
    }

    /// Writes a sequence of bytes. The writer does not need to be aligned.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_aligned() {
            self.buf.extend_from_slice(bytes);
        }
        else {
            for &byte in bytes {
                self.write_bits_leq32(u32::from(byte), 8);
            }
        }
    }

    /// Writes an unsigned Exp-Golomb code, `ue(v)`.
    pub fn write_exp_golomb_unsigned(&mut self, value: u32) {
        self.write_exp_golomb_code(u64::from(value));
    }

    /// Writes a signed Exp-Golomb code, `se(v)`.
    pub fn write_exp_golomb_signed(&mut self, value: i32) {
        let magnitude = u64::from(value.unsigned_abs());

        self.write_exp_golomb_code(if value > 0 { 2 * magnitude - 1 } else { 2 * magnitude });
    }

    fn write_exp_golomb_code(&mut self, value: u64) {
        let code = value + 1;
        let len = u64::BITS - code.leading_zeros();

        // (len - 1) zeros followed by the len-bit code, which always begins with a 1 bit.
        self.write_bits_leq64(0, len - 1);
        self.write_bits_leq64(code, len);
    }

    /// Pads the stream with 0 bits up to the next byte boundary.
    pub fn realign(&mut self) {
        if self.n_acc > 0 {
            self.write_bits_leq32(0, 8 - self.n_acc);
        }
    }

    /// Pads the stream to a byte boundary and returns the written bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.realign();
        self.buf
    }
}
