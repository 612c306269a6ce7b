//! Planar float image storage.
//!
//! Planes are allocated at the block-aligned capacity computed in
//! `start_compress` and logically cropped to the image extent until the
//! color pipeline re-expands them with edge replication.

/// A single float plane with a fixed physical capacity and a logical size.
#[derive(Debug, Clone)]
pub struct PlaneF32 {
    xsize: usize,
    ysize: usize,
    stride: usize,
    rows_capacity: usize,
    data: Vec<f32>,
}

impl PlaneF32 {
    /// Allocates a zero-filled plane of the given physical size.
    #[must_use]
    pub fn new(xsize: usize, ysize: usize) -> Self {
        Self {
            xsize,
            ysize,
            stride: xsize,
            rows_capacity: ysize,
            data: vec![0.0; xsize * ysize],
        }
    }

    /// Logical width in samples.
    #[inline]
    #[must_use]
    pub fn xsize(&self) -> usize {
        self.xsize
    }

    /// Logical height in rows.
    #[inline]
    #[must_use]
    pub fn ysize(&self) -> usize {
        self.ysize
    }

    /// Shrinks the logical extent without touching the allocation.
    pub fn shrink_to(&mut self, xsize: usize, ysize: usize) {
        debug_assert!(xsize <= self.stride && ysize <= self.rows_capacity);
        self.xsize = xsize;
        self.ysize = ysize;
    }

    /// One logical row.
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.xsize]
    }

    /// One logical row, mutable.
    #[inline]
    #[must_use]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.xsize]
    }

    /// Sample at (x, y).
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.stride + x]
    }

    /// Expands the logical extent back to the physical capacity, filling
    /// the new right columns and bottom rows by edge replication.
    pub fn pad_to_capacity(&mut self) {
        let old_x = self.xsize;
        let old_y = self.ysize;
        self.xsize = self.stride;
        self.ysize = self.rows_capacity;
        if old_x == 0 || old_y == 0 {
            return;
        }
        for y in 0..old_y {
            let start = y * self.stride;
            let edge = self.data[start + old_x - 1];
            for x in old_x..self.stride {
                self.data[start + x] = edge;
            }
        }
        let last = (old_y - 1) * self.stride;
        for y in old_y..self.rows_capacity {
            let dst = y * self.stride;
            self.data.copy_within(last..last + self.stride, dst);
        }
    }

    /// Copies the logical contents of `src` into this plane.
    pub fn copy_from(&mut self, src: &PlaneF32) {
        debug_assert_eq!(self.stride, src.stride);
        self.xsize = src.xsize;
        self.ysize = src.ysize;
        self.data.copy_from_slice(&src.data);
    }
}

/// Three planes of identical geometry.
#[derive(Debug, Clone)]
pub struct Image3F {
    planes: [PlaneF32; 3],
}

impl Image3F {
    /// Allocates three zero-filled planes.
    #[must_use]
    pub fn new(xsize: usize, ysize: usize) -> Self {
        Self {
            planes: [
                PlaneF32::new(xsize, ysize),
                PlaneF32::new(xsize, ysize),
                PlaneF32::new(xsize, ysize),
            ],
        }
    }

    /// Shrinks all planes to the logical extent.
    pub fn shrink_to(&mut self, xsize: usize, ysize: usize) {
        for plane in &mut self.planes {
            plane.shrink_to(xsize, ysize);
        }
    }

    /// Plane `c`.
    #[inline]
    #[must_use]
    pub fn plane(&self, c: usize) -> &PlaneF32 {
        &self.planes[c]
    }

    /// Plane `c`, mutable.
    #[inline]
    #[must_use]
    pub fn plane_mut(&mut self, c: usize) -> &mut PlaneF32 {
        &mut self.planes[c]
    }

    /// Mutable access to all three planes at once.
    #[inline]
    #[must_use]
    pub fn planes_mut(&mut self) -> &mut [PlaneF32; 3] {
        &mut self.planes
    }

    /// Duplicates plane 0 into planes 1 and 2.
    pub fn fan_out_plane0(&mut self) {
        let (first, rest) = self.planes.split_at_mut(1);
        rest[0].copy_from(&first[0]);
        rest[1].copy_from(&first[0]);
    }

    /// Pads all planes to their physical capacity by edge replication.
    pub fn pad_to_capacity(&mut self) {
        for plane in &mut self.planes {
            plane.pad_to_capacity();
        }
    }
}
