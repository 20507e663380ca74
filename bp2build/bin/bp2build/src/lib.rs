// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod allowlists;
pub mod bazel;
pub mod codegen;
pub mod starlark_fmt;
