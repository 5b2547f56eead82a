use super::VmError;

/// Operand stack of the evaluator, bounded by `max_size`.
///
/// Pops report which opcode underflowed so the error points at the
/// offending record.
#[derive(Debug)]
pub(crate) struct Stack<T> {
    items: Vec<T>,
    max_size: usize,
}

impl<T> Stack<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Vec::with_capacity(max_size.min(64)),
            max_size,
        }
    }

    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), VmError> {
        if self.items.len() >= self.max_size {
            return Err(VmError::StackOverflow {
                limit: self.max_size,
            });
        }
        self.items.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Removes everything above `base`, oldest first.
    pub fn split_off(&mut self, base: usize) -> Vec<T> {
        self.items.split_off(base.min(self.items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_limit() {
        let mut stack = Stack::new(2);
        assert_eq!(stack.push(1), Ok(()));
        assert_eq!(stack.push(2), Ok(()));
        assert_eq!(stack.push(3), Err(VmError::StackOverflow { limit: 2 }));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek(), Some(&2));
    }

    #[test]
    fn test_split_off_keeps_order() {
        let mut stack = Stack::new(8);
        for i in 0..5 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.split_off(2), vec![2, 3, 4]);
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.split_off(10), Vec::<i32>::new());
    }
}
